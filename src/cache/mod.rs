// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Caching layer: a block-partitioned virtual buffer plus the filelike that
//! drives it against a remote reader.

pub mod cached_filelike;
pub mod lru_buffer;

pub use cached_filelike::CachedFilelike;
pub use lru_buffer::VirtualLruBuffer;
