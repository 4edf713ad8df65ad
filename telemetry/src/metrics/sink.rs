/// Destination for the metric observations derived from the feed.
///
/// The dispatcher only talks to this trait, so tests can record
/// observations instead of going through Prometheus.
pub trait MetricsSink {
    /// Current best block height.
    fn set_best_block(&self, height: u64);

    /// Current best finalized block height.
    fn set_best_finalized(&self, height: u64);

    /// Time between a block first becoming best and being finalized.
    fn observe_time_to_finality(&self, secs: f64);

    fn observe_block_production_time(&self, secs: f64);

    /// Propagation time of a block to `node`. `node` is empty when the
    /// importing node is not known.
    fn observe_block_propagation_time(&self, node: &str, secs: f64);

    /// A block was produced by a watched producer.
    fn inc_block_produced(&self, producer: &str);

    fn inc_prevote_received(&self, address: &str, name: &str);

    fn inc_precommit_received(&self, address: &str, name: &str);
}
