//! Tutor Brain Library Crate
//!
//! This library contains the decision-making half of the tutor: the command
//! channel to the robot listener, the typed robot proxy on top of it, and the
//! session controller that walks a user through login and a puzzle list.

pub mod channel;
pub mod config;
pub mod robot;
pub mod session;
