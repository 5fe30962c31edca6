//! Core types and the calendar cache engine for Min Renovasjon waste collection schedules.

/// Domain models and identifiers shared by the cache and its collaborators.
pub mod model;
/// Decoding and joining of the upstream schedule and fraction payloads.
pub mod parse;
/// Traits describing the upstream API and the clock.
pub mod ports;
/// Cache facade used by host integrations.
pub mod service;
/// Rules deciding when a cached schedule must be fetched again.
pub mod staleness;

pub use model::*;
pub use ports::*;
pub use service::*;
pub use staleness::*;
