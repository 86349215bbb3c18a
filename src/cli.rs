use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AppConfig, ENV_API_BASE, ENV_API_KEY_VAR_NAME, ENV_IMAGE_BASE, ENV_MODEL};
use crate::model::{
    DietaryGoal, Ingredient, TimeAvailable, UserPreferences, DEFAULT_QUANTITY, STANDARD_DIETS,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Identify ingredients in photos and get recipe ideas", long_about = None)]
pub struct Cli {
    /// Print results as JSON instead of a readable summary
    #[arg(long, global = true)]
    pub json: bool,

    /// Name of the environment variable that holds the API key
    #[arg(long, global = true, env = ENV_API_KEY_VAR_NAME)]
    pub api_key_env: Option<String>,

    /// Generative model to call
    #[arg(long, global = true, env = ENV_MODEL)]
    pub model: Option<String>,

    /// Base URL of the generative API
    #[arg(long, global = true, env = ENV_API_BASE)]
    pub api_base: Option<String>,

    /// Base URL of the recipe image service
    #[arg(long, global = true, env = ENV_IMAGE_BASE)]
    pub image_base: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Identify the ingredients visible in one or more photos
    Identify {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Suggest recipes for a list of ingredients
    Suggest {
        /// Ingredient as `name` or `name=quantity`; repeat for several
        #[arg(short, long = "ingredient", required = true)]
        ingredients: Vec<String>,
        #[command(flatten)]
        preferences: PreferenceArgs,
    },
    /// Identify ingredients in photos, then suggest recipes for them
    Cook {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[command(flatten)]
        preferences: PreferenceArgs,
    },
    /// Recover JSON from a saved model response and print it
    Extract { file: PathBuf },
}

#[derive(Args, Debug, Clone)]
pub struct PreferenceArgs {
    #[arg(long, value_enum, default_value_t = TimeAvailable::Normal)]
    pub time: TimeAvailable,
    #[arg(long, value_enum, default_value_t = DietaryGoal::UseLeftovers)]
    pub goal: DietaryGoal,
    /// Standard diet to honour (e.g. "Vegana", "Sin Gluten"); repeat for several
    #[arg(long = "diet")]
    pub diets: Vec<String>,
    /// Free-text diet outside the standard list; replaces any other custom diet
    #[arg(long)]
    pub custom_diet: Option<String>,
    #[arg(long, default_value_t = 2)]
    pub servings: u32,
}

impl PreferenceArgs {
    pub fn to_preferences(&self) -> UserPreferences {
        let mut prefs = UserPreferences {
            time_available: self.time,
            dietary_goal: self.goal,
            specific_diets: Vec::new(),
            desired_servings: (self.servings > 0).then_some(self.servings),
        };
        for diet in self.diets.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
            if !STANDARD_DIETS.contains(&diet) {
                prefs.set_custom_diet(diet);
            } else if !prefs.specific_diets.iter().any(|d| d == diet) {
                prefs.toggle_diet(diet);
            }
        }
        if let Some(custom) = &self.custom_diet {
            prefs.set_custom_diet(custom);
        }
        prefs
    }
}

impl Cli {
    /// Environment config with any command-line overrides applied.
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::from_env();
        if let Some(v) = &self.api_key_env {
            config.api_key_env_var = v.clone();
        }
        if let Some(v) = &self.model {
            config.model = v.clone();
        }
        if let Some(v) = &self.api_base {
            config.api_base = v.clone();
        }
        if let Some(v) = &self.image_base {
            config.image_base = v.clone();
        }
        config
    }
}

/// Parses `name=quantity` (or just `name`) into an ingredient.
pub fn parse_ingredient_arg(arg: &str, index: usize) -> Option<Ingredient> {
    let (name, quantity) = match arg.split_once('=') {
        Some((name, quantity)) => (name.trim(), quantity.trim()),
        None => (arg.trim(), ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(Ingredient {
        id: format!("cli-{}", index),
        name: name.to_string(),
        quantity: if quantity.is_empty() {
            DEFAULT_QUANTITY.to_string()
        } else {
            quantity.to_string()
        },
        state: None,
    })
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
