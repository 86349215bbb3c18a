//! Screen state for one interactive run: which view is active, the working
//! ingredient list, the suggested recipes and the user's preferences.
//!
//! Every mutation happens in response to a completed user action or a
//! completed model call; failures end up as a single user-facing message in
//! [`Session::error`].

use tracing::{error, info};

use crate::api_connection::connection::ContentGenerator;
use crate::image_input::ImageBatch;
use crate::ingredient_identifier::{identify_ingredients_from_images, merge_ingredients};
use crate::model::{
    manual_id, Ingredient, PreferencesUpdate, Recipe, UserPreferences, DEFAULT_QUANTITY,
};
use crate::recipe_image::DEFAULT_IMAGE_BASE;
use crate::recipe_suggester::suggest_recipes_with_image_base;

pub const MSG_NO_IMAGES: &str = "Por favor, selecciona o captura al menos una imagen.";
pub const MSG_NOTHING_IDENTIFIED: &str = "No pudimos identificar ingredientes en las imágenes. Inténtalo de nuevo con imágenes más claras o edita la lista manualmente.";
pub const MSG_IDENTIFICATION_FAILED: &str = "No pudimos identificar los ingredientes de una o más imágenes. Inténtalo de nuevo o edita la lista manualmente.";
pub const MSG_NO_INGREDIENTS: &str = "Por favor, añade al menos un ingrediente para buscar recetas.";
pub const MSG_NO_RECIPES: &str = "No encontramos recetas con esos ingredientes y preferencias. Prueba a ajustar los ingredientes o preferencias.";
pub const MSG_SUGGESTION_FAILED: &str = "Hubo un problema al generar recetas. Por favor, inténtalo de nuevo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppView {
    #[default]
    Home,
    IngredientEdit,
    RecipeSuggestions,
    RecipeDetail,
}

pub struct Session<G: ContentGenerator> {
    generator: G,
    image_base: String,
    pub view: AppView,
    pub uploaded_images: Vec<String>,
    pub ingredients: Vec<Ingredient>,
    pub recipes: Vec<Recipe>,
    pub selected_recipe: Option<Recipe>,
    pub preferences: UserPreferences,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<G: ContentGenerator> Session<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            view: AppView::Home,
            uploaded_images: Vec::new(),
            ingredients: Vec::new(),
            recipes: Vec::new(),
            selected_recipe: None,
            preferences: UserPreferences::default(),
            is_loading: false,
            error: None,
        }
    }

    pub fn with_image_base(mut self, image_base: &str) -> Self {
        self.image_base = image_base.to_string();
        self
    }

    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Sends the accepted images of `batch` for identification.
    ///
    /// Rejected images are reported but do not stop the others. With no
    /// accepted image at all, no model call is made and the view stays home.
    pub async fn submit_images(&mut self, batch: &ImageBatch) {
        self.error = batch.rejection_message();

        if batch.accepted.is_empty() {
            let message = match self.error.take() {
                Some(rejections) => format!("{}\n{}", rejections, MSG_NO_IMAGES),
                None => MSG_NO_IMAGES.to_string(),
            };
            self.error = Some(message);
            return;
        }

        self.uploaded_images = batch.data_urls();
        self.is_loading = true;
        self.view = AppView::IngredientEdit;

        match identify_ingredients_from_images(&self.generator, &self.uploaded_images).await {
            Ok(batches) => {
                self.ingredients = merge_ingredients(batches);
                info!(count = self.ingredients.len(), "ingredient list ready for review");
                if self.ingredients.is_empty() {
                    self.error = Some(MSG_NOTHING_IDENTIFIED.to_string());
                }
            }
            Err(e) => {
                error!(error = %e, "identifying ingredients from images failed");
                self.error = Some(MSG_IDENTIFICATION_FAILED.to_string());
                self.ingredients.clear();
            }
        }
        self.is_loading = false;
    }

    /// True when the last identification or suggestion call failed in
    /// transport, rather than coming back empty.
    pub fn request_failed(&self) -> bool {
        matches!(
            self.error.as_deref(),
            Some(MSG_IDENTIFICATION_FAILED) | Some(MSG_SUGGESTION_FAILED)
        )
    }

    /// Adds a manual ingredient. Blank names are ignored.
    pub fn add_ingredient(
        &mut self,
        name: &str,
        quantity: &str,
        unit: &str,
    ) -> Option<&Ingredient> {
        self.error = None;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let full_quantity = format!("{} {}", quantity.trim(), unit.trim()).trim().to_string();
        self.ingredients.push(Ingredient {
            id: manual_id(),
            name: name.to_string(),
            quantity: if full_quantity.is_empty() {
                DEFAULT_QUANTITY.to_string()
            } else {
                full_quantity
            },
            state: None,
        });
        self.ingredients.last()
    }

    fn ingredient_mut(&mut self, id: &str) -> Option<&mut Ingredient> {
        self.ingredients.iter_mut().find(|ing| ing.id == id)
    }

    pub fn rename_ingredient(&mut self, id: &str, name: &str) -> bool {
        self.error = None;
        match self.ingredient_mut(id) {
            Some(ing) => {
                ing.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn update_quantity(&mut self, id: &str, quantity: &str) -> bool {
        self.error = None;
        match self.ingredient_mut(id) {
            Some(ing) => {
                ing.quantity = quantity.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove_ingredient(&mut self, id: &str) -> bool {
        self.error = None;
        let before = self.ingredients.len();
        self.ingredients.retain(|ing| ing.id != id);
        self.ingredients.len() != before
    }

    /// Requests recipes for the current ingredient list and preferences.
    pub async fn confirm_ingredients(&mut self) {
        if self.ingredients.is_empty() {
            self.error = Some(MSG_NO_INGREDIENTS.to_string());
            return;
        }
        self.error = None;
        self.is_loading = true;
        self.view = AppView::RecipeSuggestions;

        match suggest_recipes_with_image_base(
            &self.generator,
            &self.ingredients,
            &self.preferences,
            &self.image_base,
        )
        .await
        {
            Ok(recipes) => {
                self.recipes = recipes;
                if self.recipes.is_empty() {
                    self.error = Some(MSG_NO_RECIPES.to_string());
                }
            }
            Err(e) => {
                error!(error = %e, "suggesting recipes failed");
                self.error = Some(MSG_SUGGESTION_FAILED.to_string());
                self.recipes.clear();
            }
        }
        self.is_loading = false;
    }

    pub async fn refresh_recipes(&mut self) {
        self.confirm_ingredients().await;
    }

    pub fn update_preferences(&mut self, update: PreferencesUpdate) {
        self.error = None;
        self.preferences.apply(update);
    }

    pub fn toggle_diet(&mut self, diet: &str) {
        self.error = None;
        self.preferences.toggle_diet(diet);
    }

    pub fn set_custom_diet(&mut self, text: &str) {
        self.error = None;
        self.preferences.set_custom_diet(text);
    }

    pub fn increase_servings(&mut self) {
        self.error = None;
        self.preferences.increase_servings();
    }

    pub fn decrease_servings(&mut self) {
        self.error = None;
        self.preferences.decrease_servings();
    }

    pub fn select_recipe(&mut self, index: usize) -> Option<&Recipe> {
        self.error = None;
        let recipe = self.recipes.get(index)?.clone();
        self.selected_recipe = Some(recipe);
        self.view = AppView::RecipeDetail;
        self.selected_recipe.as_ref()
    }

    pub fn back(&mut self) {
        self.error = None;
        match self.view {
            AppView::RecipeDetail => {
                self.view = AppView::RecipeSuggestions;
                self.selected_recipe = None;
            }
            AppView::RecipeSuggestions => {
                self.view = AppView::IngredientEdit;
                self.recipes.clear();
            }
            AppView::IngredientEdit => self.go_home(),
            AppView::Home => {}
        }
    }

    /// Returns to the start screen, discarding images, ingredients and recipes.
    pub fn go_home(&mut self) {
        self.view = AppView::Home;
        self.uploaded_images.clear();
        self.ingredients.clear();
        self.recipes.clear();
        self.selected_recipe = None;
    }
}
