//! Cross-message correlation state.
//!
//! The feed only reports facts about individual events. Deriving metrics
//! such as time-to-finality or per-node propagation requires remembering
//! earlier events, which is what this module holds:
//!
//! - [`nodes::NodeRegistry`]: node id to display name,
//! - [`pending::PendingFinality`]: block number to first-seen-as-best time.
//!
//! The state is owned by a single dispatcher and is rebuilt from scratch on
//! every feed (re)connect.

pub mod nodes;
pub mod pending;

pub use nodes::NodeRegistry;
pub use pending::{DEFAULT_MAX_PENDING_BLOCKS, PendingFinality};

/// Everything the dispatcher needs to remember between events.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    pub nodes: NodeRegistry,
    pub pending: PendingFinality,
}

impl CorrelationStore {
    /// Creates an empty store whose pending map holds at most
    /// `max_pending_blocks` entries (`0` for no limit).
    pub fn new(max_pending_blocks: usize) -> Self {
        Self {
            nodes: NodeRegistry::new(),
            pending: PendingFinality::with_capacity(max_pending_blocks),
        }
    }

    /// Forgets all nodes and pending blocks.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::NodeId;

    #[test]
    fn reset_clears_both_maps() {
        let mut store = CorrelationStore::new(16);
        store.nodes.insert(NodeId::from(1), "node");
        store.pending.record(5, 10);

        store.reset();

        assert!(store.nodes.is_empty());
        assert!(store.pending.is_empty());
    }
}
