//! modsim — Modbus slave simulator over TCP
//!
//! Serves configured register maps to Modbus masters over plain Modbus TCP
//! (MBAP framing) and over RTU frames carried on a TCP stream. Every port is
//! an independent listener; register data is read from a [`RegisterLookup`]
//! on each request, so changes to the backing store are visible immediately.
//!
//! The public `api` module exposes the server builder, the collaborator
//! traits and hooks. The protocol engine, the in-memory store and the
//! boot/CLI helpers live in hidden modules to keep implementation details
//! out of the generated documentation.
//!
//! [`RegisterLookup`]: api::modbus::RegisterLookup

pub mod api;
#[doc(hidden)]
pub mod boot;
#[doc(hidden)]
pub mod cli;
#[doc(hidden)]
pub mod core;
#[doc(hidden)]
pub mod protocol;
#[doc(hidden)]
pub mod utils;

pub use api::*;
