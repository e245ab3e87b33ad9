// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! A block-partitioned byte buffer of fixed virtual size with LRU eviction.
//!
//! Read requests carry arbitrary ranges not aligned to block boundaries;
//! keeping a total virtual address space with per-block residency bitmaps
//! (rather than one giant bitmap over the whole file) keeps cache-hit
//! checks and eviction local to the blocks actually touched. Shaped after a
//! pooled, reusable byte slab, generalized here to track which sub-ranges
//! of each slab actually hold data rather than assuming a slab is either
//! empty or full.

use crate::core::error::{EngineError, Result};
use crate::range::Range;
use std::collections::{HashMap, VecDeque};

struct Block {
    data: Vec<u8>,
    /// Byte ranges local to this block (offsets relative to the block
    /// start) that have been written.
    resident: Vec<Range>,
}

impl Block {
    fn new(size: usize) -> Self {
        Block { data: vec![0u8; size], resident: Vec::new() }
    }

    fn mark_resident(&mut self, local: Range) {
        self.resident.push(local);
        coalesce(&mut self.resident);
    }

    fn has_data(&self, local: Range) -> bool {
        crate::range::is_covered(local, &self.resident)
    }
}

/// Merge a list of ranges into sorted, non-overlapping canonical form.
fn coalesce(ranges: &mut Vec<Range>) {
    if ranges.is_empty() {
        return;
    }
    ranges.sort();
    let mut merged = Vec::with_capacity(ranges.len());
    let mut current = ranges[0];
    for &next in &ranges[1..] {
        if next.start <= current.end {
            current = Range::new(current.start, current.end.max(next.end)).unwrap();
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    *ranges = merged;
}

/// Virtual LRU byte buffer: a fixed total address space, partitioned into
/// fixed-size blocks, with LRU eviction when the live block count exceeds
/// `num_blocks`.
pub struct VirtualLruBuffer {
    total_size: u64,
    block_size: u64,
    num_blocks: Option<usize>,
    blocks: HashMap<u64, Block>,
    /// Most-recently-used block indices at the back.
    lru_order: VecDeque<u64>,
}

impl VirtualLruBuffer {
    /// `block_size = None` means the whole file fits in a single block.
    /// `num_blocks = None` means no eviction is ever performed.
    pub fn new(total_size: u64, block_size: Option<u64>, num_blocks: Option<usize>) -> Self {
        let block_size = block_size.unwrap_or(total_size.max(1));
        VirtualLruBuffer { total_size, block_size, num_blocks, blocks: HashMap::new(), lru_order: VecDeque::new() }
    }

    fn block_index(&self, offset: u64) -> u64 {
        offset / self.block_size
    }

    fn block_bounds(&self, index: u64) -> Range {
        let start = index * self.block_size;
        let end = (start + self.block_size).min(self.total_size);
        Range::new(start, end).unwrap_or(Range { start, end: start + 1 })
    }

    fn touch(&mut self, index: u64) {
        self.lru_order.retain(|&i| i != index);
        self.lru_order.push_back(index);
    }

    fn evict_if_needed(&mut self) {
        let Some(limit) = self.num_blocks else { return };
        while self.blocks.len() > limit {
            // The front of lru_order is least-recently-used, but it may
            // also be the block we are about to write (already touched).
            // Find the LRU block that is not the most recent entry.
            if let Some(victim) = self.lru_order.pop_front() {
                self.blocks.remove(&victim);
            } else {
                break;
            }
        }
    }

    /// Write `src` at virtual offset `dst_offset`, spanning as many blocks
    /// as necessary. Touched blocks become most-recently-used; writing to
    /// an absent block may evict the least-recently-used resident block.
    pub fn copy_from(&mut self, src: &[u8], dst_offset: u64) {
        if src.is_empty() {
            return;
        }
        let write_range = Range::new(dst_offset, dst_offset + src.len() as u64)
            .expect("copy_from called with empty source");

        let first_block = self.block_index(write_range.start);
        let last_block = self.block_index(write_range.end - 1);

        for block_idx in first_block..=last_block {
            let bounds = self.block_bounds(block_idx);
            let write_start = write_range.start.max(bounds.start);
            let write_end = write_range.end.min(bounds.end);
            if write_start >= write_end {
                continue;
            }

            let is_new = !self.blocks.contains_key(&block_idx);
            if is_new {
                self.blocks.insert(block_idx, Block::new((bounds.end - bounds.start) as usize));
            }
            self.touch(block_idx);
            if is_new {
                self.evict_if_needed();
            }

            let block = self.blocks.get_mut(&block_idx).expect("block just inserted");
            let local_start = (write_start - bounds.start) as usize;
            let local_end = (write_end - bounds.start) as usize;
            let src_start = (write_start - write_range.start) as usize;
            let src_end = (write_end - write_range.start) as usize;
            block.data[local_start..local_end].copy_from_slice(&src[src_start..src_end]);
            block.mark_resident(Range::new(local_start as u64, local_end as u64).unwrap());
        }
    }

    /// True iff every byte in `[start, end)` is resident.
    pub fn has_data(&self, start: u64, end: u64) -> bool {
        let Ok(query) = Range::new(start, end) else { return true };
        let first_block = self.block_index(query.start);
        let last_block = self.block_index(query.end - 1);

        for block_idx in first_block..=last_block {
            let bounds = self.block_bounds(block_idx);
            let Some(local_query) = Range::new(
                query.start.max(bounds.start) - bounds.start,
                query.end.min(bounds.end) - bounds.start,
            )
            .ok() else {
                continue;
            };
            match self.blocks.get(&block_idx) {
                Some(block) if block.has_data(local_query) => continue,
                _ => return false,
            }
        }
        true
    }

    /// Return the bytes in `[start, end)`. Fails if `has_data` is false.
    pub fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if !self.has_data(start, end) {
            return Err(EngineError::invariant_violation(format!(
                "slice [{start}, {end}) requested data not resident"
            )));
        }
        if start == end {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity((end - start) as usize);
        let first_block = self.block_index(start);
        let last_block = self.block_index(end - 1);
        for block_idx in first_block..=last_block {
            let bounds = self.block_bounds(block_idx);
            let read_start = start.max(bounds.start);
            let read_end = end.min(bounds.end);
            let block = self.blocks.get(&block_idx).expect("has_data verified residency");
            let local_start = (read_start - bounds.start) as usize;
            let local_end = (read_end - bounds.start) as usize;
            out.extend_from_slice(&block.data[local_start..local_end]);
        }
        Ok(out)
    }

    /// All resident byte ranges across the whole buffer, in canonical
    /// (sorted, disjoint) form.
    pub fn ranges_with_data(&self) -> Vec<Range> {
        let mut global: Vec<Range> = Vec::new();
        let mut indices: Vec<&u64> = self.blocks.keys().collect();
        indices.sort();
        for &idx in indices {
            let bounds = self.block_bounds(idx);
            let block = &self.blocks[&idx];
            for r in &block.resident {
                global.push(Range::new(bounds.start + r.start, bounds.start + r.end).unwrap());
            }
        }
        coalesce(&mut global);
        global
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_when_block_size_omitted() {
        let mut buf = VirtualLruBuffer::new(100, None, None);
        buf.copy_from(&[1, 2, 3], 0);
        assert!(buf.has_data(0, 3));
        assert!(!buf.has_data(0, 10));
        assert_eq!(buf.slice(0, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn write_spans_multiple_blocks() {
        let mut buf = VirtualLruBuffer::new(30, Some(10), None);
        let data: Vec<u8> = (0..25).collect();
        buf.copy_from(&data, 5);
        assert!(buf.has_data(5, 30));
        assert!(!buf.has_data(0, 30));
        assert_eq!(buf.slice(5, 30).unwrap(), data);
    }

    #[test]
    fn partial_block_residency_is_tracked() {
        let mut buf = VirtualLruBuffer::new(20, Some(20), None);
        buf.copy_from(&[1, 2, 3], 0);
        buf.copy_from(&[9, 9], 10);
        assert!(buf.has_data(0, 3));
        assert!(buf.has_data(10, 12));
        assert!(!buf.has_data(0, 12));
        assert!(buf.slice(0, 12).is_err());
    }

    #[test]
    fn lru_eviction_drops_least_recently_used_block() {
        let mut buf = VirtualLruBuffer::new(40, Some(10), Some(2));
        buf.copy_from(&[1; 10], 0); // block 0
        buf.copy_from(&[2; 10], 10); // block 1
        buf.copy_from(&[3; 10], 20); // block 2, evicts block 0 (LRU)
        assert!(!buf.has_data(0, 10));
        assert!(buf.has_data(10, 20));
        assert!(buf.has_data(20, 30));
    }

    #[test]
    fn ranges_with_data_is_sorted_and_coalesced() {
        let mut buf = VirtualLruBuffer::new(100, Some(50), None);
        buf.copy_from(&[1; 10], 0);
        buf.copy_from(&[1; 10], 10);
        buf.copy_from(&[1; 10], 60);
        let ranges = buf.ranges_with_data();
        assert_eq!(ranges, vec![Range::new(0, 20).unwrap(), Range::new(60, 70).unwrap()]);
    }

    #[test]
    fn file_fitting_in_cache_never_evicts() {
        let mut buf = VirtualLruBuffer::new(10, None, Some(1));
        buf.copy_from(&[1; 10], 0);
        assert!(buf.has_data(0, 10));
    }
}
