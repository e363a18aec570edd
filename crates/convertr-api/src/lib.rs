//! Convertr API Library
//!
//! HTTP handlers, error rendering and application setup for the conversion
//! server.

mod handlers;
mod utils;

pub mod error;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
