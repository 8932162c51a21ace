//! tix-core: tickets stored as marker files on a dedicated git branch.
//!
//! # Conventions
//!
//! - **Errors**: [`error::TixError`] for library operations, `anyhow::Result`
//!   at the config edge.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod backend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod settings;
pub mod store;
pub mod txn;

pub use error::{ErrorCode, Result, TixError};
pub use model::{Ticket, TicketState};
pub use store::{CreateOptions, ListOutcome, Store, StoreOptions};
