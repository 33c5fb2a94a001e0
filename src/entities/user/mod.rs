//! User entity module

pub mod handlers;
pub mod model;

pub use model::*;
