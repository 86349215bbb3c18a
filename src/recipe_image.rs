//! Image URLs for suggested recipes.
//!
//! The URL points at a generate-by-URL service; nothing is fetched here; the
//! display layer loads it lazily.

pub const DEFAULT_IMAGE_BASE: &str = "https://image.pollinations.ai/prompt/";

pub fn image_prompt(description: &str) -> String {
    format!(
        "hyperrealistic professional food photography of a dish best described as: \"{}\". \
         The style should be cinematic with dramatic lighting, 8k resolution, hyper-detailed, \
         and look incredibly mouth-watering and appetizing.",
        description
    )
}

pub fn generate_recipe_image_url(description: &str) -> String {
    generate_recipe_image_url_with_base(DEFAULT_IMAGE_BASE, description)
}

pub fn generate_recipe_image_url_with_base(base: &str, description: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(&image_prompt(description))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_deterministic_and_encoded() {
        let a = generate_recipe_image_url("Tortilla jugosa con patatas y cebolla");
        let b = generate_recipe_image_url("Tortilla jugosa con patatas y cebolla");
        assert_eq!(a, b);
        assert!(
            a.starts_with("https://image.pollinations.ai/prompt/hyperrealistic%20professional")
        );
        assert!(a.contains("%22Tortilla%20jugosa%20con%20patatas%20y%20cebolla%22"));
        assert!(!a.contains(' '));
    }

    #[test]
    fn non_ascii_description_is_percent_encoded() {
        let url = generate_recipe_image_url("Salmón al horno");
        assert!(url.contains("Salm%C3%B3n"));
    }

    #[test]
    fn custom_base_is_joined_with_single_slash() {
        let url = generate_recipe_image_url_with_base("http://localhost:8080/prompt/", "sopa");
        assert!(url.starts_with("http://localhost:8080/prompt/hyperrealistic"));
    }
}
