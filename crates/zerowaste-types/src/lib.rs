//! Shared domain and wire types for the ZeroWaste services.

pub mod api;
pub mod models;
