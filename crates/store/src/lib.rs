//! # autoscaler-store
//!
//! The object store the reconcilers run against.
//!
//! [`ObjectStore`] is the backend seam. [`InMemoryObjectStore`] implements
//! it with resource versions, finalizer-gated deletion and a watch
//! channel; [`TracingObjectStore`] logs calls to any backend; [`Client`]
//! adds typed access on top.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod error;
pub mod store;

pub use client::Client;
pub use error::{Error, Result};
pub use store::{
    InMemoryObjectStore, ObjectStore, StoreStats, TracingObjectStore, WatchEvent, WatchEventKind,
};
