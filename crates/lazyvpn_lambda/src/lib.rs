//! AWS-oriented adapters and handlers for the lazy-vpn functions.
//!
//! This crate owns runtime integration details (Lambda handlers, provider
//! adapter seams, and environment settings). Domain primitives such as the
//! region table and boot script come from `lazyvpn_core`.

pub mod adapters;
pub mod handlers;
pub mod logging;
pub mod settings;
