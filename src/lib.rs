pub mod api_connection;
pub mod cli;
pub mod config;
pub mod image_input;
pub mod ingredient_identifier;
pub mod json_recovery;
pub mod model;
pub mod recipe_image;
pub mod recipe_suggester;
pub mod session;
