//! Error types for the wayline engine.
//!
//! The engine distinguishes three failure kinds: infeasible user input
//! (surfaced as 422), unknown sessions (404), and internal defects (500).
//! Transient upstream failures are not represented here at all; the route
//! oracle recovers from them locally with its offline fallback.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The request cannot be satisfied: too few active stops, or no feasible
    /// route even after exhausting droppable stops. Never retried.
    #[error("{0}")]
    Infeasible(String),

    /// No stored itinerary for the given session.
    #[error("no itinerary found for session {0}")]
    SessionNotFound(String),

    /// Solver, scorer or orchestrator defect. The caller decides whether to
    /// retry with the original inputs.
    #[error("internal replan error: {0}")]
    Internal(String),
}

impl Error {
    pub fn infeasible(msg: impl Into<String>) -> Self {
        Error::Infeasible(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

/// Convenience result type for wayline operations.
pub type Result<T> = std::result::Result<T, Error>;
