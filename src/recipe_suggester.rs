use serde_json::Value;
use tracing::{error, info, warn};

use crate::api_connection::connection::{ApiConnectionError, ContentGenerator};
use crate::api_connection::endpoints::{GenerateContentRequest, Part};
use crate::json_recovery::parse_json_from_text;
use crate::model::{
    indexed_id, EstimatedNutrition, Ingredient, Recipe, RecipeIngredient, Substitution,
    UserPreferences,
};
use crate::recipe_image::{generate_recipe_image_url_with_base, DEFAULT_IMAGE_BASE};

pub const UNTITLED_RECIPE: &str = "Receta sin título";
pub const MISSING_DESCRIPTION: &str = "Sin descripción.";
pub const MISSING_TIME: &str = "N/A";
pub const FALLBACK_SERVINGS: u32 = 2;

const RECIPE_SHAPE: &str = r#"{
    "title": "Nombre del plato (string)",
    "description": "Descripción breve del plato y de por qué encaja. Debe nombrar claramente los ingredientes principales de la lista del usuario que se aprovechan (ej: 'Aprovecha tus tomates frescos, la cebolla y los pimientos...').",
    "prepTime": "Tiempo de preparación estimado (string, ej: '15 minutos')",
    "cookTime": "Tiempo de cocción estimado (string, ej: '30 minutos')",
    "servings": "Número de porciones (number)",
    "ingredients": [
      { "name": "Nombre del ingrediente", "quantity": "Cantidad", "unit": "Unidad (ej: 'g', 'ml', 'taza', 'cucharadita', 'unidad')" }
    ],
    "instructions": ["Paso 1...", "Paso 2..."],
    "dietaryTags": ["Etiquetas dietéticas que apliquen (ej: 'vegano', 'sin gluten'), o [] si ninguna"],
    "estimatedNutrition": { "calories": "ej: '500 kcal'", "protein": "ej: '30g'", "carbs": "ej: '50g'", "fat": "ej: '20g'" },
    "possibleSubstitutions": [
      { "originalIngredient": "Ingrediente de la receta", "suggestion": "Sustitución o nota" }
    ],
    "imageQuery": "Frase MUY descriptiva y específica del plato del campo 'title' (ej: 'pastel de chocolate esponjoso con fresas frescas y nata'). Nada genérico como 'comida'."
  }"#;

/// `name (quantity)` pairs joined by commas, the way the prompt lists the pantry.
pub fn ingredient_list_string(ingredients: &[Ingredient]) -> String {
    ingredients
        .iter()
        .map(|ing| format!("{} ({})", ing.name, ing.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}

fn servings_instruction(prefs: &UserPreferences) -> String {
    match prefs.desired_servings {
        Some(servings) if servings > 0 => format!(
            "
  MUY IMPORTANTE: el usuario quiere recetas para {servings} porciones. En CADA receta:
  1. El campo \"servings\" DEBE valer exactamente {servings}.
  2. Las cantidades (\"quantity\") de TODOS los ingredientes del campo \"ingredients\" DEBEN estar escaladas por ti para {servings} porciones.
"
        ),
        _ => String::new(),
    }
}

fn dietary_instruction(prefs: &UserPreferences) -> String {
    if prefs.specific_diets.is_empty() {
        return String::new();
    }
    format!(
        "
  RESTRICCIONES DIETÉTICAS OBLIGATORIAS: [{}].
  TODAS las recetas deben cumplir TODAS estas restricciones. Por ejemplo:
    - \"Vegana\": sin carne, pescado, lácteos, huevos, miel ni otros productos de origen animal; \"dietaryTags\" incluye \"Vegana\".
    - \"Sin Gluten\": sin trigo, cebada, centeno, espelta, kamut, triticale ni derivados con gluten; \"dietaryTags\" incluye \"Sin Gluten\".
    - \"Sin Lácteos\": sin leche, queso, yogur, mantequilla, nata ni otros lácteos; \"dietaryTags\" incluye \"Sin Lácteos\".
  Adapta o elige solo recetas que se ajusten estrictamente, y refleja las restricciones cumplidas en \"dietaryTags\".
",
        prefs.specific_diets.join(", ")
    )
}

pub fn build_suggestion_prompt(ingredients: &[Ingredient], prefs: &UserPreferences) -> String {
    let diets = if prefs.specific_diets.is_empty() {
        "ninguna en particular".to_string()
    } else {
        prefs.specific_diets.join(", ")
    };

    format!(
        "
  IMPORTANTE: toda la respuesta, incluido todo el texto dentro del JSON (títulos, descripciones, instrucciones, etiquetas), DEBE estar en español.

  Ingredientes disponibles: {ingredients}.

  Sugiere como mínimo 6 recetas variadas que se puedan preparar combinando estos ingredientes.
  La respuesta DEBE ser un array JSON de objetos de receta y nada más.

  NOTA SOBRE TORTILLAS: solo puedes sugerir una tortilla (ej: \"Tortilla de Patatas\") si \"huevos\" aparece explícitamente en la lista de ingredientes disponibles; si no, no sugieras ninguna. Si sugieres una tortilla, su \"description\" NO debe mencionar la palabra \"huevos\" y debe centrarse en los OTROS ingredientes del usuario (ej: \"Una tortilla jugosa que aprovecha tus patatas y tu cebolla...\").

  Cada receta debe tener EXACTAMENTE esta estructura, con todos los campos y la sintaxis JSON correcta (comas entre campos y entre elementos):
  {shape}
{servings}
  Preferencias del usuario:
  - Tiempo disponible: {time} (opciones: 'quick', 'normal', 'advanced').
  - Objetivo dietético: {goal} (opciones: 'light', 'hearty', 'use_leftovers').
  - Dietas específicas: {diets}.
{dietary}
  Prioriza recetas que usen una buena parte de los ingredientes disponibles.
  Antes de responder comprueba que:
  1. La respuesta es un array JSON y NADA MÁS.
  2. La sintaxis JSON es perfecta (comas, corchetes, llaves).
  3. Cada receta tiene TODOS los campos de la estructura.
  4. El campo de los pasos se llama \"instructions\".
",
        ingredients = ingredient_list_string(ingredients),
        shape = RECIPE_SHAPE,
        servings = servings_instruction(prefs),
        time = prefs.time_available,
        goal = prefs.dietary_goal,
        diets = diets,
        dietary = dietary_instruction(prefs),
    )
}

pub fn build_suggestion_request(
    ingredients: &[Ingredient],
    prefs: &UserPreferences,
) -> GenerateContentRequest {
    GenerateContentRequest::json_from_parts(vec![Part::text(build_suggestion_prompt(
        ingredients,
        prefs,
    ))])
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn servings_of(value: Option<&Value>) -> Option<u32> {
    let servings = match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 1.0).map(|f| f.round() as u64))?,
        Value::String(s) => s
            .split_whitespace()
            .next()
            .and_then(|first| first.parse::<u64>().ok())?,
        _ => return None,
    };
    u32::try_from(servings).ok().filter(|s| *s > 0)
}

fn strings_of(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| text_of(Some(item)))
                .collect()
        })
        .unwrap_or_default()
}

fn recipe_ingredients_of(value: Option<&Value>) -> Vec<RecipeIngredient> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .map(|item| RecipeIngredient {
                    name: text_of(item.get("name")).unwrap_or_default(),
                    quantity: text_of(item.get("quantity")).unwrap_or_default(),
                    unit: text_of(item.get("unit")).unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn nutrition_of(value: Option<&Value>) -> EstimatedNutrition {
    match value {
        Some(n) if n.is_object() => EstimatedNutrition {
            calories: text_of(n.get("calories")),
            protein: text_of(n.get("protein")),
            carbs: text_of(n.get("carbs")),
            fat: text_of(n.get("fat")),
        },
        _ => EstimatedNutrition::default(),
    }
}

fn substitutions_of(value: Option<&Value>) -> Vec<Substitution> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .map(|item| Substitution {
                    original_ingredient: text_of(item.get("originalIngredient"))
                        .unwrap_or_default(),
                    suggestion: text_of(item.get("suggestion")).unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Builds a [`Recipe`] from whatever the model sent, defaulting every field
/// that is missing or has the wrong type.
pub fn normalize_recipe(
    raw: &Value,
    index: usize,
    prefs: &UserPreferences,
    image_base: &str,
) -> Recipe {
    let description =
        text_of(raw.get("description")).unwrap_or_else(|| MISSING_DESCRIPTION.to_string());
    let image_url = generate_recipe_image_url_with_base(image_base, &description);

    Recipe {
        id: indexed_id("recipe", index),
        title: text_of(raw.get("title")).unwrap_or_else(|| UNTITLED_RECIPE.to_string()),
        prep_time: text_of(raw.get("prepTime")).unwrap_or_else(|| MISSING_TIME.to_string()),
        cook_time: text_of(raw.get("cookTime")).unwrap_or_else(|| MISSING_TIME.to_string()),
        servings: servings_of(raw.get("servings"))
            .or(prefs.desired_servings.filter(|s| *s > 0))
            .unwrap_or(FALLBACK_SERVINGS),
        ingredients: recipe_ingredients_of(raw.get("ingredients")),
        instructions: strings_of(raw.get("instructions")),
        dietary_tags: strings_of(raw.get("dietaryTags")),
        estimated_nutrition: nutrition_of(raw.get("estimatedNutrition")),
        possible_substitutions: substitutions_of(raw.get("possibleSubstitutions")),
        image_query: text_of(raw.get("imageQuery")),
        image_url: Some(image_url),
        description,
    }
}

/// Normalizes a recovered value into recipes; a lone object counts as one recipe.
pub fn recipes_from_value(
    value: Value,
    prefs: &UserPreferences,
    image_base: &str,
) -> Option<Vec<Recipe>> {
    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => {
            warn!("response was a single recipe object, wrapping it in an array");
            vec![object]
        }
        _ => return None,
    };
    Some(
        items
            .iter()
            .enumerate()
            .map(|(index, raw)| normalize_recipe(raw, index, prefs, image_base))
            .collect(),
    )
}

pub async fn suggest_recipes<G>(
    generator: &G,
    ingredients: &[Ingredient],
    prefs: &UserPreferences,
) -> Result<Vec<Recipe>, ApiConnectionError>
where
    G: ContentGenerator + ?Sized,
{
    suggest_recipes_with_image_base(generator, ingredients, prefs, DEFAULT_IMAGE_BASE).await
}

pub async fn suggest_recipes_with_image_base<G>(
    generator: &G,
    ingredients: &[Ingredient],
    prefs: &UserPreferences,
    image_base: &str,
) -> Result<Vec<Recipe>, ApiConnectionError>
where
    G: ContentGenerator + ?Sized,
{
    info!(
        ingredients = ingredients.len(),
        time = %prefs.time_available,
        goal = %prefs.dietary_goal,
        "requesting recipe suggestions"
    );
    let text = generator
        .generate_text(build_suggestion_request(ingredients, prefs))
        .await
        .map_err(|e| {
            if e.is_service_unavailable() {
                warn!(error = %e, "recipe suggestion failed: service temporarily unavailable");
            } else {
                error!(error = %e, "recipe suggestion call failed");
            }
            e
        })?;

    match parse_json_from_text(&text)
        .and_then(|value| recipes_from_value(value, prefs, image_base))
    {
        Some(recipes) => {
            info!(count = recipes.len(), "received recipe suggestions");
            Ok(recipes)
        }
        None => {
            warn!(raw = %text, "could not read recipes from model output");
            Ok(Vec::new())
        }
    }
}
