//! Shared types and models for the Courier Logistics Service
//!
//! This crate contains the domain model and the pure shipment lifecycle engine
//! shared between the backend, the browser client (via WASM), and tests.

pub mod fiscal;
pub mod lifecycle;
pub mod models;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

pub use fiscal::*;
pub use lifecycle::*;
pub use models::*;
pub use types::*;
pub use validation::*;
