mod connection;
mod helpers;
mod migrations;
pub mod models;
pub mod repositories;
mod store;

pub use connection::Database;
pub use repositories::CleanupReport;
