mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::{AccessMode, Database};
