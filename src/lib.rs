//! Client-side controller for the LLM council chat.
//!
//! The crate keeps a registry of conversations in sync with the backend,
//! remembers the last selected conversation, and folds each streamed
//! three-stage answer into the active transcript.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod event;
pub mod reducer;
pub mod registry;
pub mod state;
pub mod store;
pub mod types;

pub use controller::{Controller, ControllerError, ExchangeOutcome};
pub use state::{ConnectionState, Snapshot};
