//! Cloud-agnostic building blocks for the lazy-vpn functions.
//!
//! This crate owns the launch request contract, the static region table, the
//! network plan and the instance boot script. It intentionally excludes AWS
//! SDK and Lambda runtime concerns, which live in `lazyvpn_lambda`.

pub mod boot_script;
pub mod contract;
pub mod greeting;
pub mod network;
pub mod regions;
