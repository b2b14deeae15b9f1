//! HTTP client for the recipe API.
//!
//! - `client` - `ApiClient`: dishes pages, single dishes, tags
//! - `types` - Wire types (`Dish`, `Tag`, `DishesPage`)
//! - `error` - `FetchError`, shared with the feed controller

mod client;
mod error;
mod types;

pub use client::ApiClient;
pub use error::FetchError;
pub use types::{Dish, DishesPage, Ingredient, Quantity, Tag, TagId};
