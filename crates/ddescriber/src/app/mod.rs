//! Application layer orchestrating domain logic and infrastructure.

pub mod document;
pub mod finder;
pub mod hierarchy;
pub mod pending;
pub mod project;
pub mod projection;
pub mod render;
pub mod watch;
