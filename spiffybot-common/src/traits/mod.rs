pub mod api;
pub mod auth_traits;

pub use api::{ChatApi, QuoteStore};
pub use auth_traits::TokenProvider;
