//! Domain layer for Visit Guard.
//!
//! This crate contains:
//! - Domain models (ProximityAlert, ManualVerificationRequest, Actor)
//! - The alert and verification state machines
//! - Domain error types

pub mod error;
pub mod models;

pub use error::TransitionError;
