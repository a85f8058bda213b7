//! Shared types and collaborator contracts for the puzzle tutor.
//!
//! The brain and listener processes only agree on the wire envelope defined
//! here; everything else in this crate is consumed by the brain's session
//! controller through the traits in `store`, `hint` and `analytics`.

pub mod analytics;
pub mod envelope;
pub mod hint;
pub mod puzzle;
pub mod store;
pub mod user;

pub use envelope::{Action, Command, Response, Status};
