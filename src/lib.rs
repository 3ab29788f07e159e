#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # autoscaler-operator
//!
//! Runs the cluster and machine autoscaler reconcilers over an object
//! store: configuration loading, operator wiring, and the work queue that
//! turns store events into reconcile passes.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod manifest;
pub mod operator;

pub use config::OperatorConfig;
pub use dispatch::{Dispatcher, EventMapper, WorkKey};
pub use error::{Error, Result};
pub use operator::Operator;
