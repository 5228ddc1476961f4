//! Infrastructure shared across services

pub mod events;

pub use events::{Event, EventBus};
