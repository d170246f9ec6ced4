pub mod api;
pub mod config;
pub mod error;
pub mod ids;
pub mod security;
pub mod types;

pub use error::{ErrorKind, ToolgateError};
pub use ids::*;
