//! Shared domain event schema
//!
//! Typed events published to Kafka so downstream consumers (notification
//! fan-out, analytics) agree on payload shape and delivery priority.

pub mod events;
pub mod outbox;

pub use events::DomainEvent;
