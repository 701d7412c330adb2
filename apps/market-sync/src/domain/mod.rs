//! Domain Layer - Core market data types and state.
//!
//! This layer contains the core domain types for market data
//! synchronization with no I/O. All types here are pure Rust with
//! serialization support where consumers need it.

/// Connection lifecycle state.
pub mod connection;

/// Market data streaming types (ticks, batches, alerts).
pub mod streaming;

/// Subscription tracking.
pub mod subscription;
