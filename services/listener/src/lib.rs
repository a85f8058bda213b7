//! Tutor Listener Library Crate
//!
//! This library contains the robot-side half of the tutor: the capability
//! contracts, the word capture loop, the command dispatcher and the
//! WebSocket server that feeds it. The `listener` binary is a thin wrapper
//! around this library.

pub mod capability;
pub mod capture;
pub mod config;
pub mod dispatcher;
pub mod recognition;
pub mod server;
pub mod simulator;
