//! Application Layer - Services and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (gateway transport, alert display).
pub mod ports;

/// Application services for price state, alert gating, and observers.
pub mod services;
