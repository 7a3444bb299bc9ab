//! Veridian domain core.
//!
//! Pure domain logic for the self-service settings platform: identity,
//! session, and flow models, the trait schema registry and validator,
//! the declarative form projection, and submission parsing. This crate
//! performs no I/O; persistence and transport live in `veridian-store`
//! and `veridian-api`.

pub mod error;
pub mod flow;
pub mod form;
pub mod identity;
pub mod schema;
pub mod session;
pub mod types;
pub mod ui;
