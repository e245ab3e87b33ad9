// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # robostream
//!
//! A streaming ingestion engine for robotics log files (ROS1 `.bag` and
//! MCAP containers), built to read large recordings — local or remote over
//! HTTP range requests — without materializing more than a cache budget's
//! worth of bytes at a time.
//!
//! ## Layers
//!
//! - [`range`] / [`cache`] / [`transport`] — range-cached remote file
//!   access: an HTTP range reader backed by a bounded, eviction-driven
//!   cache ([`cache::cached_filelike::CachedFilelike`]).
//! - [`schema`] / [`encoding`] — `.msg`/OMG IDL/ROS2 IDL schema parsing and
//!   the CDR and ROS1 wire decoders built from a parsed schema.
//! - [`source`] — normalizes MCAP and bag containers into one
//!   [`source::Source`] stream with topic/time filtering and backfill.
//! - [`cursor`] — a pull cursor with batching and bounded reads over a
//!   source's message stream.
//! - [`worker`] / [`factory`] — runs a source on a dedicated task behind a
//!   call/response boundary, and picks which source to run from an input
//!   descriptor's shape.
//! - [`estimate`] — an in-memory size estimator used to cost messages for
//!   eviction and back-pressure decisions.
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use robostream::factory::{RemoteDataSourceFactory, DataSourceInput};
//!
//! let factory = RemoteDataSourceFactory::new();
//! let worker = factory.initialize(DataSourceInput::Url("https://example.com/drive.mcap".into()), None);
//! let init = worker.initialize().await?;
//! println!("topics: {}", init.topics.len());
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use core::error::{EngineError, Result};
pub use core::value::{DecodedMessage, Value};

pub mod range;

pub mod cache;

pub mod transport;

pub mod estimate;

pub mod schema;

pub mod encoding;

pub mod source;

pub mod cursor;

pub mod worker;

pub mod factory;
