//! Shared utilities for the Visit Guard workspace.
//!
//! This crate provides validation helpers used by the domain payloads
//! and by the client before any request leaves the process.

pub mod validation;
