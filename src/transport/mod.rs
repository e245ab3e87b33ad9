// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Remote byte-range transport.

pub mod http_reader;

pub use http_reader::{HttpRangeReader, OpenInfo, RangeChunk};
