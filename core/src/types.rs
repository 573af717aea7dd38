//! Shared primitive types used across the entire crate.

/// The account/player identity all persisted state is keyed by.
pub type EntityId = String;

/// Identifier of a configured reward pool.
pub type PoolId = String;

/// Identifier of a configured event.
pub type EventId = String;

/// Identifier of a ticket currency.
pub type TicketId = String;

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;
