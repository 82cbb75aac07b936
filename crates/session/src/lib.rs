pub mod migrations;
pub mod models;
pub mod sqlite;
pub mod store;

pub use models::*;
pub use sqlite::*;
pub use store::*;
