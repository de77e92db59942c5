//! HTTP surface for the replan engine.

pub mod server;

pub use server::build_router;
