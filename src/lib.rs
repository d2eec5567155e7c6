//! Library crate for user-roster.
//!
//! This crate exposes the building blocks of the app:
//! - The user record (`model`)
//! - Observer channels and store change events (`events`)
//! - Device key-value settings storage (`sys`)
//! - The user store and its persistence (`store`)
//! - Application context, config, and the create-user form (`app`)
//! - Error and result types (`error`)
//! - List filtering helpers (`search`)
//!
//! It is used by the `user-roster` binary and by tests.
#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod app;
pub mod error;
pub mod events;
pub mod model;
pub mod search;
pub mod store;
pub mod sys;

// Re-export commonly used items at the crate root for convenience
/// Convenient error and result types shared across the crate.
pub use error::{DynError, Result};
pub use events::{ChangeEvent, Channel, SubscriptionId};
pub use model::User;
pub use store::{PersistHandle, STORE_KEY, UserStore, clear_local_storage};
