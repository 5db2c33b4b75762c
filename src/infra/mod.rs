//! Adapters for external systems.

pub mod artifacts;
