//! Board routing.
//!
//! - [`board_manager`] - board and connection management, the entry point
//! - [`service_cache`] - per-board operation sets, provisioned on first use
//! - [`kanban`] - the operation set bound to one board's backend
//! - [`provisioner`] - creates and migrates external board databases

pub mod board_manager;
pub mod kanban;
pub mod provisioner;
pub mod service_cache;
