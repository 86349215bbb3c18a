use anyhow::{bail, Context, Result};
use foodsnap::api_connection::endpoints::Provider;
use foodsnap::cli::{parse_args, parse_ingredient_arg, Command};
use foodsnap::config::AppConfig;
use foodsnap::image_input::load_images;
use foodsnap::json_recovery::parse_json_from_text;
use foodsnap::model::{Ingredient, Recipe, UserPreferences};
use foodsnap::session::Session;
use std::path::Path;
use tokio::fs;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "foodsnap=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_ingredients(ingredients: &[Ingredient]) {
    println!("\nIngredientes detectados ({}):", ingredients.len());
    for ingredient in ingredients {
        match &ingredient.state {
            Some(state) => println!(
                "  - {} ({}, {})",
                ingredient.name, ingredient.quantity, state
            ),
            None => println!("  - {} ({})", ingredient.name, ingredient.quantity),
        }
    }
}

fn print_preferences(prefs: &UserPreferences) {
    let servings = prefs
        .desired_servings
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "\nPreferencias: tiempo {} | objetivo {} | porciones {}",
        prefs.time_available, prefs.dietary_goal, servings
    );
    if !prefs.specific_diets.is_empty() {
        println!("   Dietas: {}", prefs.specific_diets.join(", "));
    }
    if let Some(custom) = prefs.custom_diet() {
        println!("   Dieta personalizada: {}", custom);
    }
}

fn print_recipes(recipes: &[Recipe]) {
    for (idx, recipe) in recipes.iter().enumerate() {
        println!("\n{}. {}", idx + 1, recipe.title);
        println!("   {}", recipe.description);
        println!(
            "   Preparación: {} | Cocción: {} | Porciones: {}",
            recipe.prep_time, recipe.cook_time, recipe.servings
        );
        if !recipe.dietary_tags.is_empty() {
            println!("   Etiquetas: {}", recipe.dietary_tags.join(", "));
        }
        println!("   Ingredientes:");
        for ing in &recipe.ingredients {
            println!("     - {} {} {}", ing.quantity, ing.unit, ing.name);
        }
        println!("   Pasos:");
        for (step, instruction) in recipe.instructions.iter().enumerate() {
            println!("     {}. {}", step + 1, instruction);
        }
        if let Some(url) = &recipe.image_url {
            println!("   Imagen: {}", url);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

async fn run_extract(file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read model output file '{}'", file.display()))?;
    match parse_json_from_text(&raw) {
        Some(value) => print_json(&value),
        None => bail!("No JSON could be recovered from '{}'", file.display()),
    }
}

fn build_session(config: &AppConfig) -> Result<Session<Provider>> {
    if !config.has_api_key() {
        bail!(
            "{} environment variable not set. Please set it before running foodsnap.",
            config.api_key_env_var
        );
    }
    let provider = Provider::from_config(config);
    Ok(Session::new(provider).with_image_base(&config.image_base))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = parse_args();
    let config = cli.config();

    let session = match cli.command {
        Command::Extract { file } => return run_extract(&file).await,
        Command::Identify { images } => {
            let mut session = build_session(&config)?;
            let batch = load_images(&images).await;
            session.submit_images(&batch).await;
            if cli.json {
                print_json(&session.ingredients)?;
            } else {
                print_ingredients(&session.ingredients);
            }
            session
        }
        Command::Suggest {
            ingredients,
            preferences,
        } => {
            let mut session =
                build_session(&config)?.with_preferences(preferences.to_preferences());
            session.ingredients = ingredients
                .iter()
                .enumerate()
                .filter_map(|(idx, arg)| parse_ingredient_arg(arg, idx))
                .collect();
            session.confirm_ingredients().await;
            if cli.json {
                print_json(&session.recipes)?;
            } else {
                print_preferences(&session.preferences);
                print_recipes(&session.recipes);
            }
            session
        }
        Command::Cook {
            images,
            preferences,
        } => {
            let mut session =
                build_session(&config)?.with_preferences(preferences.to_preferences());
            let batch = load_images(&images).await;
            session.submit_images(&batch).await;
            if !session.ingredients.is_empty() {
                if !cli.json {
                    print_ingredients(&session.ingredients);
                    print_preferences(&session.preferences);
                }
                session.confirm_ingredients().await;
            }
            if cli.json {
                print_json(&serde_json::json!({
                    "ingredients": session.ingredients,
                    "recipes": session.recipes,
                }))?;
            } else {
                print_recipes(&session.recipes);
            }
            session
        }
    };

    match &session.error {
        Some(message) if session.request_failed() => bail!("¡Ups! Algo salió mal.\n{}", message),
        Some(message) => eprintln!("\n{}", message),
        None => {}
    }

    Ok(())
}
