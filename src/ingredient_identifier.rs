use std::collections::HashSet;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::api_connection::connection::{ApiConnectionError, ContentGenerator};
use crate::api_connection::endpoints::{GenerateContentRequest, Part};
use crate::image_input::ImageData;
use crate::json_recovery::parse_json_from_text;
use crate::model::{indexed_id, Ingredient, DEFAULT_QUANTITY};

pub const IDENTIFICATION_PROMPT: &str = "Analiza esta imagen de una nevera, despensa o ingredientes sueltos e identifica todos los alimentos que se vean.
Para cada alimento indica su nombre, una cantidad aproximada (por ejemplo \"2 unidades\", \"medio manojo\", \"200g\", \"1 paquete\") y, si se distingue, su estado (por ejemplo \"fresco\", \"cocido\", \"envasado\").
Si la cantidad no está clara usa \"desconocido\"; si el estado no está claro omite ese campo.
Responde con un array JSON de objetos con las claves \"name\" (string), \"quantity\" (string) y, opcionalmente, \"state\" (string).
Formato esperado: [{\"name\": \"Manzana\", \"quantity\": \"3 unidades\", \"state\": \"fresco\"}, {\"name\": \"Leche\", \"quantity\": \"1 litro\", \"state\": \"envasado\"}]
La respuesta debe ser ÚNICAMENTE ese array JSON, completo y válido, sin texto adicional antes, después ni entre los objetos.
Todos los nombres (\"name\") deben estar en español. Si no reconoces ningún alimento, devuelve un array vacío: [].";

pub fn build_identification_request(image: &ImageData) -> GenerateContentRequest {
    GenerateContentRequest::json_from_parts(vec![
        Part::image(image),
        Part::text(IDENTIFICATION_PROMPT),
    ])
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Turns a recovered JSON value into ingredients.
///
/// Only arrays are accepted. Entries without a string `name` are dropped;
/// a missing quantity becomes [`DEFAULT_QUANTITY`].
pub fn ingredients_from_value(value: &Value) -> Option<Vec<Ingredient>> {
    let items = value.as_array()?;
    let ingredients = items
        .iter()
        .filter(|item| item.get("name").is_some_and(Value::is_string))
        .enumerate()
        .map(|(index, item)| Ingredient {
            id: indexed_id("gen", index),
            name: item["name"].as_str().unwrap_or_default().to_string(),
            quantity: text_field(item, "quantity").unwrap_or_else(|| DEFAULT_QUANTITY.to_string()),
            state: item
                .get("state")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect();
    Some(ingredients)
}

/// Asks the model for the ingredients visible in one image (given as a data URL).
///
/// Unparsable or non-array responses yield an empty list; transport errors
/// are returned to the caller.
pub async fn identify_ingredients_from_image<G>(
    generator: &G,
    image_data_url: &str,
) -> Result<Vec<Ingredient>, ApiConnectionError>
where
    G: ContentGenerator + ?Sized,
{
    let image = ImageData::from_data_url(image_data_url)
        .map_err(|e| ApiConnectionError::InvalidInput(e.to_string()))?;

    let text = generator
        .generate_text(build_identification_request(&image))
        .await
        .map_err(|e| {
            error!(error = %e, "ingredient identification call failed");
            e
        })?;

    match parse_json_from_text(&text).as_ref().and_then(ingredients_from_value) {
        Some(ingredients) => {
            debug!(count = ingredients.len(), "identified ingredients in image");
            Ok(ingredients)
        }
        None => {
            warn!(raw = %text, "could not read an ingredient array from model output");
            Ok(Vec::new())
        }
    }
}

/// Identifies every image concurrently and waits for all of them.
///
/// The first failure aborts the whole batch.
pub async fn identify_ingredients_from_images<G, S>(
    generator: &G,
    image_data_urls: &[S],
) -> Result<Vec<Vec<Ingredient>>, ApiConnectionError>
where
    G: ContentGenerator + ?Sized,
    S: AsRef<str>,
{
    info!(images = image_data_urls.len(), "identifying ingredients");
    try_join_all(
        image_data_urls
            .iter()
            .map(|url| identify_ingredients_from_image(generator, url.as_ref())),
    )
    .await
}

/// Flattens per-image results, keeping the first ingredient seen for each
/// trimmed, lower-cased name, and assigns fresh ids.
pub fn merge_ingredients(batches: Vec<Vec<Ingredient>>) -> Vec<Ingredient> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|ingredient| {
            let key = ingredient.name.trim().to_lowercase();
            !key.is_empty() && seen.insert(key)
        })
        .enumerate()
        .map(|(index, ingredient)| Ingredient {
            id: indexed_id("ing", index),
            ..ingredient
        })
        .collect()
}
