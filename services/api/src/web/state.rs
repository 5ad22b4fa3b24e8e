//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use benefit_tracker_core::BenefitEngine;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: BenefitEngine,
}
