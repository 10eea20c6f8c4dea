//! Core types and pipeline stages for the Erario budget loader.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! archive source and the tabular sink are reached through the [`Source`]
//! and [`Sink`] traits; concrete backends live in other crates.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod columns;
pub mod delimiter;
pub mod dimension;
pub mod driver;
pub mod error;
pub mod fact;
pub mod ipc;
pub mod money;
pub mod sink;
pub mod source;
pub mod upsert;

pub use error::{Error, Result, Stage};
pub use money::Money;
pub use sink::Sink;
pub use source::Source;

#[cfg(test)]
mod tests;
