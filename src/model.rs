use std::fmt;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Quantity given to ingredients the model or the user left unquantified.
pub const DEFAULT_QUANTITY: &str = "1 unidad";

/// Diets offered as toggles; anything else in `specific_diets` is a custom diet.
pub const STANDARD_DIETS: &[&str] = &[
    "Vegana",
    "Vegetariana",
    "Sin Gluten",
    "Sin Lácteos",
    "Baja en Carbohidratos",
    "Alta en Carbohidratos",
    "Alta en Proteínas",
    "Aumento Muscular",
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub quantity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct RecipeIngredient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct EstimatedNutrition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<String>,
}

impl EstimatedNutrition {
    pub fn is_empty(&self) -> bool {
        self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Substitution {
    #[serde(default)]
    pub original_ingredient: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub description: String,
    pub prep_time: String,
    pub cook_time: String,
    pub servings: u32,
    pub ingredients: Vec<RecipeIngredient>,
    pub instructions: Vec<String>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    #[serde(default)]
    pub estimated_nutrition: EstimatedNutrition,
    #[serde(default)]
    pub possible_substitutions: Vec<Substitution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TimeAvailable {
    Quick,
    #[default]
    Normal,
    Advanced,
}

impl TimeAvailable {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeAvailable::Quick => "quick",
            TimeAvailable::Normal => "normal",
            TimeAvailable::Advanced => "advanced",
        }
    }
}

impl fmt::Display for TimeAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DietaryGoal {
    Light,
    Hearty,
    #[default]
    #[value(name = "use_leftovers")]
    UseLeftovers,
}

impl DietaryGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            DietaryGoal::Light => "light",
            DietaryGoal::Hearty => "hearty",
            DietaryGoal::UseLeftovers => "use_leftovers",
        }
    }
}

impl fmt::Display for DietaryGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub time_available: TimeAvailable,
    pub dietary_goal: DietaryGoal,
    #[serde(default)]
    pub specific_diets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_servings: Option<u32>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            time_available: TimeAvailable::Normal,
            dietary_goal: DietaryGoal::UseLeftovers,
            specific_diets: Vec::new(),
            desired_servings: Some(2),
        }
    }
}

/// Partial update applied by [`UserPreferences::apply`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub time_available: Option<TimeAvailable>,
    pub dietary_goal: Option<DietaryGoal>,
    pub specific_diets: Option<Vec<String>>,
    pub desired_servings: Option<u32>,
}

impl UserPreferences {
    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(time) = update.time_available {
            self.time_available = time;
        }
        if let Some(goal) = update.dietary_goal {
            self.dietary_goal = goal;
        }
        if let Some(diets) = update.specific_diets {
            self.specific_diets = diets;
        }
        if let Some(servings) = update.desired_servings {
            self.desired_servings = Some(servings);
        }
    }

    /// Adds a standard diet, or removes it when already selected.
    pub fn toggle_diet(&mut self, diet: &str) {
        if let Some(pos) = self.specific_diets.iter().position(|d| d == diet) {
            self.specific_diets.remove(pos);
        } else {
            self.specific_diets.push(diet.to_string());
        }
    }

    pub fn custom_diet(&self) -> Option<&str> {
        self.specific_diets
            .iter()
            .map(String::as_str)
            .find(|d| !STANDARD_DIETS.contains(d))
    }

    /// Replaces the custom diet. Blank text removes it.
    pub fn set_custom_diet(&mut self, text: &str) {
        self.specific_diets
            .retain(|d| STANDARD_DIETS.contains(&d.as_str()));
        let text = text.trim();
        if !text.is_empty() {
            self.specific_diets.push(text.to_string());
        }
    }

    pub fn increase_servings(&mut self) {
        self.desired_servings = Some(self.desired_servings.unwrap_or(0) + 1);
    }

    pub fn decrease_servings(&mut self) {
        let current = self.desired_servings.unwrap_or(1);
        if current > 1 {
            self.desired_servings = Some(current - 1);
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn indexed_id(prefix: &str, index: usize) -> String {
    format!("{}-{}-{}", prefix, now_millis(), index)
}

pub(crate) fn manual_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("manual-{}-{}", now_millis(), suffix)
}
