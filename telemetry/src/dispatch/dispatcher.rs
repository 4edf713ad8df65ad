//! Event dispatcher.
//!
//! The dispatcher walks the events of one feed batch in arrival order,
//! updates the correlation state, consults the watch-lists, and reports
//! observations to a [`MetricsSink`].
//!
//! Two rules make the order of events significant:
//!
//! - A best-block event is handled together with the event that immediately
//!   follows it in the same batch. The feed emits an imported-block event
//!   right after a best block that was produced locally, so an imported
//!   block with zero propagation time in that position identifies the
//!   producer.
//! - A later best-block event for the same number replaces the pending
//!   finality timestamp of an earlier one.
//!
//! An event whose arguments do not have the expected shape is skipped
//! without side effects and the rest of the batch is still processed.

use tracing::{debug, info, trace};

use crate::correlation::CorrelationStore;
use crate::feed::{ActionKind, DecodeError, Event, FieldShapeError, decode};
use crate::metrics::MetricsSink;
use crate::watch::WatchList;

use super::directive::Directive;

/// Summary of one dispatched batch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of events in the batch.
    pub events: usize,
    /// Events skipped because their arguments were malformed.
    pub skipped: usize,
    /// Events with an action code this exporter does not know.
    pub unknown: usize,
    /// Control messages to send back to the feed, in order.
    pub directives: Vec<Directive>,
}

#[derive(Clone, Copy, Debug)]
enum Vote {
    Prevote,
    Precommit,
}

/// Stateful feed event handler.
///
/// A dispatcher must process one batch to completion before the next one
/// starts. Callers sharing it across tasks should hold a single lock around
/// each [`Dispatcher::handle_payload`] call.
pub struct Dispatcher<M> {
    store: CorrelationStore,
    watch: WatchList,
    sink: M,
}

impl<M> Dispatcher<M>
where
    M: MetricsSink,
{
    pub fn new(watch: WatchList, store: CorrelationStore, sink: M) -> Self {
        Self { store, watch, sink }
    }

    pub fn store(&self) -> &CorrelationStore {
        &self.store
    }

    /// Mutable access to the correlation state, mainly for tests and tooling.
    pub fn store_mut(&mut self) -> &mut CorrelationStore {
        &mut self.store
    }

    pub fn sink(&self) -> &M {
        &self.sink
    }

    /// Forgets all correlation state. Called whenever the feed reconnects.
    pub fn reset(&mut self) {
        self.store.reset();
    }

    /// Decodes a raw feed batch and dispatches its events.
    ///
    /// A decode failure discards the whole batch; nothing is dispatched.
    pub fn handle_payload(
        &mut self,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<BatchReport, DecodeError> {
        let events = decode(payload)?;
        Ok(self.dispatch(&events, now_ms))
    }

    /// Dispatches already decoded events. `now_ms` is the wall-clock time
    /// the batch was received, in milliseconds since the Unix epoch.
    pub fn dispatch(&mut self, events: &[Event], now_ms: u64) -> BatchReport {
        let mut report = BatchReport {
            events: events.len(),
            ..BatchReport::default()
        };

        for (index, event) in events.iter().enumerate() {
            let lookahead = match event.kind {
                ActionKind::BestBlock => events.get(index + 1),
                _ => None,
            };

            if !event.kind.is_known() {
                report.unknown += 1;
            }

            if let Err(err) = self.handle_event(event, lookahead, now_ms, &mut report.directives) {
                report.skipped += 1;
                debug!(index, %err, "skipping malformed feed event");
            }
        }

        report
    }

    fn handle_event(
        &mut self,
        event: &Event,
        lookahead: Option<&Event>,
        now_ms: u64,
        directives: &mut Vec<Directive>,
    ) -> Result<(), FieldShapeError> {
        match event.kind {
            ActionKind::AddedChain => self.on_added_chain(event, directives),
            ActionKind::AddedNode => self.on_added_node(event),
            ActionKind::RemovedNode => self.on_removed_node(event),
            ActionKind::BestBlock => self.on_best_block(event, lookahead, now_ms),
            ActionKind::ImportedBlock => self.on_imported_block(event),
            ActionKind::FinalizedBlock => self.on_finalized_block(event),
            ActionKind::BestFinalized => self.on_best_finalized(event, now_ms),
            ActionKind::AfgReceivedPrevote => self.on_vote(event, Vote::Prevote),
            ActionKind::AfgReceivedPrecommit => self.on_vote(event, Vote::Precommit),
            ActionKind::FeedVersion
            | ActionKind::LocatedNode
            | ActionKind::NodeStats
            | ActionKind::NodeHardware
            | ActionKind::TimeSync
            | ActionKind::RemovedChain
            | ActionKind::SubscribedTo
            | ActionKind::UnsubscribedFrom
            | ActionKind::Pong
            | ActionKind::AfgFinalized
            | ActionKind::AfgAuthoritySet => Ok(()),
            ActionKind::Unknown(code) => {
                trace!(code, "ignoring unrecognized feed action");
                Ok(())
            }
        }
    }

    fn on_added_chain(
        &mut self,
        event: &Event,
        directives: &mut Vec<Directive>,
    ) -> Result<(), FieldShapeError> {
        let chain = event.str_at(&[0])?;

        if self.watch.is_chain_watched(chain) {
            directives.push(Directive::Subscribe(chain.to_string()));
            directives.push(Directive::SendFinality(true));
            info!(chain, "subscribing to chain with finality data");
        }
        Ok(())
    }

    fn on_added_node(&mut self, event: &Event) -> Result<(), FieldShapeError> {
        let id = event.node_id_at(&[0])?;
        let name = event.str_at(&[1, 0])?;

        info!(node_id = %id, node = name, "new node");
        self.store.nodes.insert(id, name);
        Ok(())
    }

    fn on_removed_node(&mut self, event: &Event) -> Result<(), FieldShapeError> {
        let id = event.node_id_at(&[0])?;
        let name = self.store.nodes.remove(&id).unwrap_or_default();

        info!(node_id = %id, node = %name, "node departed");
        Ok(())
    }

    fn on_best_block(
        &mut self,
        event: &Event,
        lookahead: Option<&Event>,
        now_ms: u64,
    ) -> Result<(), FieldShapeError> {
        let block = event.u64_at(&[0])?;
        // `null` until the feed has an average block time.
        let production_ms = event.optional_millis_at(&[2])?;

        self.sink.set_best_block(block);
        match production_ms {
            Some(ms) => self.sink.observe_block_production_time(ms / 1000.0),
            None => trace!(block, "best block without production time"),
        }

        match self.store.pending.record(block, now_ms) {
            Some(dropped) if dropped == block => {
                debug!(block, "pending finality map full, not tracking older block")
            }
            Some(evicted) => debug!(evicted, "pending finality map full, dropped oldest block"),
            None => {}
        }
        debug!(block, "new best block");

        if let Some(next) = lookahead {
            self.attribute_producer(block, next);
        }
        Ok(())
    }

    /// Counts `block` for its producer when `next` shows the producing node
    /// importing it with zero propagation time.
    fn attribute_producer(&self, block: u64, next: &Event) {
        if next.kind != ActionKind::ImportedBlock {
            return;
        }
        let Ok(node) = next.node_id_at(&[0]) else {
            return;
        };
        // `null` means "not measured", which is not the same as zero.
        if !matches!(next.optional_millis_at(&[1, 4]), Ok(Some(ms)) if ms == 0.0) {
            return;
        }

        let producer = self.store.nodes.name_of(&node);
        if self.watch.is_producer_watched(producer) {
            info!(block, producer, "block produced by watched producer");
            self.sink.inc_block_produced(producer);
        }
    }

    fn on_imported_block(&mut self, event: &Event) -> Result<(), FieldShapeError> {
        let id = event.node_id_at(&[0])?;
        let block = event.u64_at(&[1, 0])?;
        let propagation_ms = event.optional_millis_at(&[1, 4])?;

        let node = self.store.nodes.name_of(&id);
        match propagation_ms {
            Some(ms) => self.sink.observe_block_propagation_time(node, ms / 1000.0),
            None => trace!(block, node_id = %id, "imported block without propagation time"),
        }
        debug!(block, node_id = %id, "block imported");
        Ok(())
    }

    fn on_finalized_block(&mut self, event: &Event) -> Result<(), FieldShapeError> {
        let block = event.u64_at(&[1])?;

        debug!(block, "new finalized block");
        Ok(())
    }

    fn on_best_finalized(&mut self, event: &Event, now_ms: u64) -> Result<(), FieldShapeError> {
        let block = event.u64_at(&[0])?;

        self.sink.set_best_finalized(block);

        match self.store.pending.take(block) {
            Some(seen_ms) => {
                let finality_secs = now_ms.saturating_sub(seen_ms) as f64 / 1000.0;
                debug!(block, finality_secs, "block finalized");
                self.sink.observe_time_to_finality(finality_secs);
            }
            None => trace!(block, "finalized block was never seen as best"),
        }
        Ok(())
    }

    fn on_vote(&mut self, event: &Event, vote: Vote) -> Result<(), FieldShapeError> {
        let address = event.str_at(&[3])?;

        let Some(name) = self.watch.validator_name(address) else {
            return Ok(());
        };
        match vote {
            Vote::Prevote => self.sink.inc_prevote_received(address, name),
            Vote::Precommit => self.sink.inc_precommit_received(address, name),
        }
        debug!(?vote, address, name, "vote from watched validator");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::*;
    use crate::config::{SubscriptionConfig, ValidatorConfig};
    use crate::feed::NodeId;

    #[derive(Clone, Debug, PartialEq)]
    enum Observation {
        BestBlock(u64),
        BestFinalized(u64),
        TimeToFinality(f64),
        ProductionTime(f64),
        PropagationTime(String, f64),
        BlockProduced(String),
        Prevote(String, String),
        Precommit(String, String),
    }

    /// Sink that records every observation in order.
    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<Observation>>,
    }

    impl RecordingSink {
        fn push(&self, obs: Observation) {
            self.seen.lock().unwrap().push(obs);
        }

        fn take(&self) -> Vec<Observation> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    impl MetricsSink for RecordingSink {
        fn set_best_block(&self, height: u64) {
            self.push(Observation::BestBlock(height));
        }

        fn set_best_finalized(&self, height: u64) {
            self.push(Observation::BestFinalized(height));
        }

        fn observe_time_to_finality(&self, secs: f64) {
            self.push(Observation::TimeToFinality(secs));
        }

        fn observe_block_production_time(&self, secs: f64) {
            self.push(Observation::ProductionTime(secs));
        }

        fn observe_block_propagation_time(&self, node: &str, secs: f64) {
            self.push(Observation::PropagationTime(node.to_string(), secs));
        }

        fn inc_block_produced(&self, producer: &str) {
            self.push(Observation::BlockProduced(producer.to_string()));
        }

        fn inc_prevote_received(&self, address: &str, name: &str) {
            self.push(Observation::Prevote(address.to_string(), name.to_string()));
        }

        fn inc_precommit_received(&self, address: &str, name: &str) {
            self.push(Observation::Precommit(address.to_string(), name.to_string()));
        }
    }

    fn dispatcher(cfg: SubscriptionConfig) -> Dispatcher<RecordingSink> {
        Dispatcher::new(
            WatchList::new(&cfg),
            CorrelationStore::new(64),
            RecordingSink::default(),
        )
    }

    fn watching_producers(prefixes: &[&str]) -> Dispatcher<RecordingSink> {
        dispatcher(SubscriptionConfig {
            producers: prefixes.iter().map(|p| p.to_string()).collect(),
            ..SubscriptionConfig::default()
        })
    }

    fn payload(batch: Value) -> Vec<u8> {
        serde_json::to_vec(&batch).unwrap()
    }

    fn added_node(id: u64, name: &str) -> [Value; 2] {
        [json!(3), json!([id, [name, "Parity Polkadot", "0.9.42"]])]
    }

    fn best_block(number: u64, production_ms: u64) -> [Value; 2] {
        [json!(1), json!([number, 1_700_000_000_000u64, production_ms])]
    }

    fn imported_block(node: u64, number: u64, propagation_ms: Value) -> [Value; 2] {
        [
            json!(6),
            json!([node, [number, "0xabc", 6000, 1_700_000_000_000u64, propagation_ms]]),
        ]
    }

    fn best_finalized(number: u64) -> [Value; 2] {
        [json!(2), json!([number, "0xdef"])]
    }

    fn batch(events: &[[Value; 2]]) -> Vec<u8> {
        let flat: Vec<Value> = events.iter().flat_map(|pair| pair.iter().cloned()).collect();
        payload(Value::Array(flat))
    }

    #[test]
    fn watched_producer_is_credited_for_locally_imported_block() {
        let mut d = watching_producers(&["Alice"]);
        d.store_mut().nodes.insert(NodeId::from(7), "Alice-node-1");

        let report = d
            .handle_payload(
                &batch(&[best_block(100, 600), imported_block(7, 100, json!(0))]),
                1_000,
            )
            .unwrap();

        assert_eq!(report.events, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            d.sink().take(),
            vec![
                Observation::BestBlock(100),
                Observation::ProductionTime(0.6),
                Observation::BlockProduced("Alice-node-1".to_string()),
                Observation::PropagationTime("Alice-node-1".to_string(), 0.0),
            ]
        );
    }

    #[test]
    fn producer_registered_in_same_batch_is_resolved() {
        let mut d = watching_producers(&["Alice"]);

        d.handle_payload(
            &batch(&[
                added_node(7, "Alice-node-1"),
                best_block(100, 600),
                imported_block(7, 100, json!(0)),
            ]),
            1_000,
        )
        .unwrap();

        let produced: Vec<_> = d
            .sink()
            .take()
            .into_iter()
            .filter(|o| matches!(o, Observation::BlockProduced(_)))
            .collect();
        assert_eq!(produced, vec![Observation::BlockProduced("Alice-node-1".to_string())]);
    }

    #[test]
    fn best_block_without_production_time_keeps_other_effects() {
        let mut d = watching_producers(&["Alice"]);
        d.store_mut().nodes.insert(NodeId::from(7), "Alice-node-1");

        let report = d
            .handle_payload(
                &batch(&[
                    [json!(1), json!([100, 1_700_000_000_000u64, null])],
                    imported_block(7, 100, json!(0)),
                ]),
                1_000,
            )
            .unwrap();

        assert_eq!(report.skipped, 0);
        assert!(d.store().pending.contains(100));
        assert_eq!(
            d.sink().take(),
            vec![
                Observation::BestBlock(100),
                Observation::BlockProduced("Alice-node-1".to_string()),
                Observation::PropagationTime("Alice-node-1".to_string(), 0.0),
            ]
        );
    }

    #[test]
    fn nonzero_or_missing_propagation_is_not_local_production() {
        let mut d = watching_producers(&["Alice"]);
        d.store_mut().nodes.insert(NodeId::from(7), "Alice-node-1");

        d.handle_payload(
            &batch(&[best_block(100, 600), imported_block(7, 100, json!(250))]),
            1_000,
        )
        .unwrap();
        d.handle_payload(
            &batch(&[best_block(101, 600), imported_block(7, 101, json!(null))]),
            2_000,
        )
        .unwrap();

        assert!(
            !d.sink()
                .take()
                .iter()
                .any(|o| matches!(o, Observation::BlockProduced(_)))
        );
    }

    #[test]
    fn producer_requires_imported_block_right_after_best_block() {
        let mut d = watching_producers(&["Alice"]);
        d.store_mut().nodes.insert(NodeId::from(7), "Alice-node-1");

        // Something else sits between the best block and the import.
        d.handle_payload(
            &batch(&[
                best_block(100, 600),
                [json!(15), json!(0)],
                imported_block(7, 100, json!(0)),
            ]),
            1_000,
        )
        .unwrap();
        // Best block is the last event of its batch.
        d.handle_payload(&batch(&[best_block(101, 600)]), 2_000)
            .unwrap();

        assert!(
            !d.sink()
                .take()
                .iter()
                .any(|o| matches!(o, Observation::BlockProduced(_)))
        );
    }

    #[test]
    fn unwatched_or_unknown_producer_is_not_counted() {
        let mut d = watching_producers(&["Bob"]);
        d.store_mut().nodes.insert(NodeId::from(7), "Alice-node-1");

        d.handle_payload(
            &batch(&[
                best_block(100, 600),
                imported_block(7, 100, json!(0)),
                best_block(101, 600),
                imported_block(8, 101, json!(0)),
            ]),
            1_000,
        )
        .unwrap();

        assert!(
            !d.sink()
                .take()
                .iter()
                .any(|o| matches!(o, Observation::BlockProduced(_)))
        );
    }

    #[test]
    fn time_to_finality_spans_batches_and_is_reported_once() {
        let mut d = dispatcher(SubscriptionConfig::default());

        d.handle_payload(&batch(&[best_block(100, 600)]), 1_000_000)
            .unwrap();
        d.sink().take();
        assert!(d.store().pending.contains(100));

        d.handle_payload(&batch(&[best_finalized(100)]), 1_012_500)
            .unwrap();
        assert_eq!(
            d.sink().take(),
            vec![
                Observation::BestFinalized(100),
                Observation::TimeToFinality(12.5),
            ]
        );
        assert!(!d.store().pending.contains(100));

        d.handle_payload(&batch(&[best_finalized(100)]), 1_020_000)
            .unwrap();
        assert_eq!(d.sink().take(), vec![Observation::BestFinalized(100)]);
    }

    #[test]
    fn latest_best_block_timestamp_wins() {
        let mut d = dispatcher(SubscriptionConfig::default());

        d.handle_payload(&batch(&[best_block(100, 600)]), 1_000)
            .unwrap();
        d.handle_payload(&batch(&[best_block(100, 700)]), 4_000)
            .unwrap();
        d.sink().take();

        d.handle_payload(&batch(&[best_finalized(100)]), 10_000)
            .unwrap();
        assert!(d.sink().take().contains(&Observation::TimeToFinality(6.0)));
    }

    #[test]
    fn finalizing_unseen_block_only_sets_gauge() {
        let mut d = dispatcher(SubscriptionConfig::default());

        let report = d
            .handle_payload(&batch(&[best_finalized(42)]), 5_000)
            .unwrap();

        assert_eq!(report.skipped, 0);
        assert_eq!(d.sink().take(), vec![Observation::BestFinalized(42)]);
    }

    #[test]
    fn clock_going_backwards_yields_zero_finality() {
        let mut d = dispatcher(SubscriptionConfig::default());

        d.handle_payload(&batch(&[best_block(5, 100)]), 9_000).unwrap();
        d.handle_payload(&batch(&[best_finalized(5)]), 8_000).unwrap();

        assert!(d.sink().take().contains(&Observation::TimeToFinality(0.0)));
    }

    #[test]
    fn removed_node_resolves_to_empty_label() {
        let mut d = dispatcher(SubscriptionConfig::default());

        d.handle_payload(
            &batch(&[added_node(9, "Charlie"), [json!(4), json!([9])]]),
            1_000,
        )
        .unwrap();
        assert!(!d.store().nodes.contains(&NodeId::from(9)));

        let report = d
            .handle_payload(&batch(&[imported_block(9, 50, json!(120))]), 2_000)
            .unwrap();

        assert_eq!(report.skipped, 0);
        assert_eq!(
            d.sink().take(),
            vec![Observation::PropagationTime(String::new(), 0.12)]
        );
    }

    #[test]
    fn removing_unknown_node_is_a_no_op() {
        let mut d = dispatcher(SubscriptionConfig::default());

        let report = d
            .handle_payload(&batch(&[[json!(4), json!([404])]]), 1_000)
            .unwrap();

        assert_eq!(report.skipped, 0);
        assert!(d.store().nodes.is_empty());
    }

    #[test]
    fn votes_count_only_for_watched_validators() {
        let mut d = dispatcher(SubscriptionConfig {
            validators: vec![ValidatorConfig {
                address: "5GrwvaEF".to_string(),
                name: "alice".to_string(),
            }],
            ..SubscriptionConfig::default()
        });

        d.handle_payload(
            &batch(&[
                [json!(17), json!([7, "0xtarget", 100, "5GrwvaEF", "set-1"])],
                [json!(18), json!([7, "0xtarget", 100, "5GrwvaEF", "set-1"])],
                [json!(17), json!([8, "0xtarget", 100, "5FHneW46", "set-1"])],
                [json!(18), json!([8, "0xtarget", 100, "5FHneW46", "set-1"])],
            ]),
            1_000,
        )
        .unwrap();

        assert_eq!(
            d.sink().take(),
            vec![
                Observation::Prevote("5GrwvaEF".to_string(), "alice".to_string()),
                Observation::Precommit("5GrwvaEF".to_string(), "alice".to_string()),
            ]
        );
    }

    #[test]
    fn watched_chain_yields_subscribe_and_finality_directives() {
        let mut d = dispatcher(SubscriptionConfig {
            chains: vec!["kusama".to_string()],
            ..SubscriptionConfig::default()
        });

        let report = d
            .handle_payload(
                &batch(&[
                    [json!(11), json!(["Kusama", 120])],
                    [json!(11), json!(["Westend", 30])],
                    [json!(11), json!(["Kusama", 121])],
                ]),
                1_000,
            )
            .unwrap();

        assert_eq!(
            report.directives,
            vec![
                Directive::Subscribe("Kusama".to_string()),
                Directive::SendFinality(true),
                Directive::Subscribe("Kusama".to_string()),
                Directive::SendFinality(true),
            ]
        );
    }

    #[test]
    fn malformed_event_is_skipped_without_side_effects() {
        let mut d = dispatcher(SubscriptionConfig::default());

        let report = d
            .handle_payload(
                &batch(&[
                    // Production time missing.
                    [json!(1), json!([100])],
                    [json!(3), json!([7])],
                    [json!(7), json!([])],
                    best_finalized(99),
                ]),
                1_000,
            )
            .unwrap();

        assert_eq!(report.events, 4);
        assert_eq!(report.skipped, 3);
        assert!(!d.store().pending.contains(100));
        assert!(d.store().nodes.is_empty());
        assert_eq!(d.sink().take(), vec![Observation::BestFinalized(99)]);
    }

    #[test]
    fn undecodable_batch_dispatches_nothing() {
        let mut d = dispatcher(SubscriptionConfig::default());

        let err = d
            .handle_payload(br#"[1,[100,0,600],2]"#, 1_000)
            .unwrap_err();

        assert!(matches!(err, DecodeError::OddLength(3)));
        assert!(d.sink().take().is_empty());
        assert!(d.store().pending.is_empty());
    }

    #[test]
    fn unknown_and_informational_actions_have_no_effect() {
        let mut d = dispatcher(SubscriptionConfig::default());

        let report = d
            .handle_payload(
                &batch(&[
                    [json!(0), json!(32)],
                    [json!(99), json!({"future": true})],
                    [json!(7), json!([7, 98])],
                    [json!(8), json!([7, [12, null]])],
                    [json!(15), json!(0)],
                ]),
                1_000,
            )
            .unwrap();

        assert_eq!(report.unknown, 1);
        assert_eq!(report.skipped, 0);
        assert!(report.directives.is_empty());
        assert!(d.sink().take().is_empty());
    }

    #[test]
    fn reset_forgets_nodes_and_pending_blocks() {
        let mut d = dispatcher(SubscriptionConfig::default());
        d.handle_payload(
            &batch(&[added_node(1, "node-1"), best_block(10, 500)]),
            1_000,
        )
        .unwrap();

        d.reset();
        d.sink().take();

        assert!(d.store().nodes.is_empty());
        d.handle_payload(&batch(&[best_finalized(10)]), 2_000)
            .unwrap();
        assert_eq!(d.sink().take(), vec![Observation::BestFinalized(10)]);
    }
}
