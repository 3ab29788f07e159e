//! # autoscaler-core
//!
//! Shared building blocks for the autoscaler operator:
//!
//! - [`Object`] and [`ObjectMeta`]: the object model the store persists
//! - [`HasMetadata`]: the capability interface reconcilers use to touch
//!   annotations, labels, owner references and finalizers
//! - [`Resource`]: typed kinds that convert to and from [`Object`]
//! - [`GroupVersionKind`], [`ObjectKey`], [`NamespacedName`]: identifiers
//! - duration, quantity and label-value parsing used by validation

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod duration;
pub mod error;
pub mod gvk;
pub mod label;
pub mod meta;
pub mod object;
pub mod quantity;

pub use duration::{is_valid_duration, parse_duration};
pub use error::{Error, Result};
pub use gvk::{GroupVersionKind, NamespacedName, ObjectKey};
pub use label::{is_valid_label_value, validate_label_value};
pub use meta::{HasMetadata, LabelSelector, ObjectMeta, OwnerReference};
pub use object::{Object, Resource};
pub use quantity::{MIB, format_decimal_si, parse_integer_quantity};
