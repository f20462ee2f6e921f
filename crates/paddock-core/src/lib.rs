//! # paddock-core
//!
//! Machine-lifecycle orchestration core for Paddock.
//!
//! This crate provides the pieces a development-environment manager is
//! built around:
//!
//! - [`Machine`]: the central entity — persisted identity, provider
//!   action dispatch, connection-info resolution, guest resolution
//! - [`BatchExecutor`]: concurrent, provider-grouped execution of queued
//!   actions with partial-failure aggregation
//! - [`PluginRegistry`]: plugin-keyed factories for providers, guests,
//!   and communicators
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 paddock-core                    │
//! │  ┌──────────────┐          ┌─────────────────┐  │
//! │  │BatchExecutor │─────────▶│     Machine     │  │
//! │  └──────────────┘          └────────┬────────┘  │
//! │                                     │           │
//! │            ┌────────────────────────┼─────────┐ │
//! │            ▼                        ▼         ▼ │
//! │     ┌────────────┐          ┌────────────┐ ┌───┴────┐
//! │     │  Provider  │          │   Guest    │ │Communi-│
//! │     │ (backend)  │          │  (chain)   │ │ cator  │
//! │     └────────────┘          └────────────┘ └────────┘
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Concrete provider drivers, guest implementations, and communicator
//! transports live outside this crate and are consumed through the
//! capability traits.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod communicator;
pub mod config;
pub mod connection;
pub mod environment;
pub mod error;
pub mod guest;
pub mod machine;
pub mod persistence;
pub mod provider;
pub mod registry;
pub mod state;
pub mod ui;

pub use batch::BatchExecutor;
pub use communicator::{Communicator, CommunicatorFactory, DEFAULT_COMMUNICATOR};
pub use config::{KeyPaths, ProjectConfig, SshConfig, SshDefaults};
pub use connection::{ConnectionInfo, ConnectionInfoResolver, ProviderConnectionInfo};
pub use environment::{BaseImage, Environment, Manifest};
pub use error::{BatchError, BatchFailure, CoreError, Result};
pub use guest::{Guest, GuestCapability, GuestPlugin};
pub use machine::{ActionContext, Machine, MachineDefinition};
pub use persistence::MachineData;
pub use provider::{Provider, ProviderAction, ProviderFactory};
pub use registry::PluginRegistry;
pub use state::MachineState;
pub use ui::{SilentUi, TracingUi, Ui};
