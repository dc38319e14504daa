//! # TurnPilot
//!
//! The runner: loads a planned route, listens for the game and steers the
//! rider through every junction on the plan.
//!
//! ## Architecture
//!
//! ```text
//!  connection signals ──┐
//!                       ▼
//!  game payloads ──► MessageRouter ──► Dispatcher ──► Notification ──► Engine
//!                                      (one thread,                    │
//!                                       GameStateMachine)               ├─► TaskTable
//!                                                                      └─► navigation task
//!                                                                            │
//!                                                      CommandSink ◄────────┘
//! ```
//!
//! Every state change goes through the dispatcher thread, in arrival order.
//! The engine reacts to the resulting notifications by starting and
//! stopping tasks; nothing else mutates the game state.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod navigator;
pub mod router;
pub mod store;
pub mod tasks;

pub use config::{AppConfig, NavigationConfig};
pub use dispatcher::{DispatchEvent, Dispatcher, GameStateMachine, Notification};
pub use engine::{completion_action, signal_event, CompletionAction, Engine, GameLink};
pub use error::{EngineError, EngineResult, StoreError, StoreResult};
pub use navigator::{navigate, run_navigation};
pub use router::{event_for, MessageRouter};
pub use store::{RouteStore, TomlRouteStore};
pub use tasks::{TaskName, TaskTable};
