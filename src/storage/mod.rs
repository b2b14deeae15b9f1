mod positions;
mod preferences;
mod schema;
mod types;

pub use positions::{Position, PositionStore};
pub use schema::Database;
pub use types::DatabaseError;
