//! Shared utilities
//!
//! - Hex text handling for stored register data

pub mod hex;
