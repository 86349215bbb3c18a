pub mod connection;
pub mod endpoints;

pub use connection::{ApiConnectionError, ContentGenerator};
pub use endpoints::{GenerateContentRequest, Part, Provider};
