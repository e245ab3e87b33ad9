// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message body decoding.
//!
//! - [`cdr`] decodes DDS-XTypes CDR payloads (MCAP's `cdr` message encoding).
//! - [`ros1`] decodes the plain ROS1 wire format (bag connections).
//!
//! Writing logs back out in either format is out of scope for an ingestion
//! engine, so neither module has an encode side.

pub mod cdr;
pub mod ros1;

pub use cdr::CdrDecoder;
pub use ros1::Ros1Decoder;
