//! Route handlers for the relay and the queue API.

pub mod events;
pub mod health;
pub mod queue;
pub mod relay;
pub mod results;
pub mod tools;
