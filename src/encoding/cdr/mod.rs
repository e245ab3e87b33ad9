// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CDR (Common Data Representation) decoding for ROS 2 / DDS-XTypes messages.
//!
//! Only decode is in scope — this engine ingests logs, it does not write
//! them. ROS1's plain wire format has no alignment padding and is handled
//! by the sibling [`crate::encoding::ros1`] module instead of this one.

pub mod cursor;
pub mod decoder;
pub mod plan;

pub use cursor::{CdrCursor, CDR_HEADER_SIZE};
pub use decoder::CdrDecoder;
pub use plan::{DecodeOp, DecodePlan, ElementType};
