//! Request handlers.

pub mod health;
pub mod model;
pub mod predict;

pub use health::*;
pub use model::*;
pub use predict::*;
