//! Blocks seen as best that have not been finalized yet.
//!
//! Each entry maps a block number to the wall-clock time (milliseconds since
//! the Unix epoch) it was first reported as best. The entry is consumed when
//! the matching best-finalized event arrives, which yields time-to-finality.
//!
//! Blocks that are never finalized (missed events, reorgs) would otherwise
//! accumulate forever, so the map is capped. When it is full the lowest block
//! number is evicted first: it is the oldest and the least likely to still
//! receive a finality notice.

use std::collections::BTreeMap;

/// Default cap on the number of pending blocks.
pub const DEFAULT_MAX_PENDING_BLOCKS: usize = 4096;

#[derive(Debug)]
pub struct PendingFinality {
    seen_at: BTreeMap<u64, u64>,
    /// `0` disables the cap.
    max_len: usize,
}

impl Default for PendingFinality {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_PENDING_BLOCKS)
    }
}

impl PendingFinality {
    pub fn with_capacity(max_len: usize) -> Self {
        Self {
            seen_at: BTreeMap::new(),
            max_len,
        }
    }

    /// Records that `block` became best at `now_ms`. A later record for the
    /// same block replaces the earlier one.
    ///
    /// Returns the block number that was dropped to stay within the cap, if
    /// any. When the map is full and `block` is lower than every pending
    /// entry, `block` itself is the one dropped and is not recorded.
    pub fn record(&mut self, block: u64, now_ms: u64) -> Option<u64> {
        let full = self.max_len != 0 && self.seen_at.len() >= self.max_len;
        if !full || self.seen_at.contains_key(&block) {
            self.seen_at.insert(block, now_ms);
            return None;
        }

        match self.seen_at.first_key_value() {
            Some((&lowest, _)) if block < lowest => Some(block),
            _ => {
                let evicted = self.seen_at.pop_first().map(|(evicted, _)| evicted);
                self.seen_at.insert(block, now_ms);
                evicted
            }
        }
    }

    /// Removes and returns the time `block` became best.
    pub fn take(&mut self, block: u64) -> Option<u64> {
        self.seen_at.remove(&block)
    }

    pub fn contains(&self, block: u64) -> bool {
        self.seen_at.contains_key(&block)
    }

    pub fn len(&self) -> usize {
        self.seen_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_at.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen_at.clear();
    }
}
