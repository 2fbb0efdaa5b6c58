//! # taskboard
//!
//! Project-management backend: workspaces hold projects, projects hold tasks,
//! and tasks are ordered inside status columns by fractional positions.
//!
//! ## Architecture
//!
//! ```text
//!   HTTP (axum) ──► api ──► board::TaskMover ──► ordering::PositionAllocator
//!                    │              │
//!                    └──────────────┴──────────► store::BoardStore (memory | sqlite)
//! ```
//!
//! ## Modules
//! - `ordering`: position allocation and partition rebalancing
//! - `board`: domain types, the move handler and analytics
//! - `store`: storage trait and backends
//! - `api`: HTTP routes, auth and handlers
//! - `config`: environment configuration

pub mod api;
pub mod board;
pub mod config;
pub mod ordering;
pub mod store;

pub use config::Config;
