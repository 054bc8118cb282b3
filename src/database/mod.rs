//! Database module exports.

pub mod models;
mod repository;
mod sqlite;
mod users;

pub use models::*;
pub use repository::*;
pub use sqlite::Database;
pub use users::UserRepo;
