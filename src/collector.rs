//! The fetch-aggregate-persist cycle.

use log::{error, info};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::aggregate::aggregate;
use crate::source::ReportSource;
use crate::storage::SummarySink;

/// Drives the periodic collection cycle. Owns the source and the sink
/// outright; cycles run strictly one after another and no cycle outcome,
/// good or bad, stops the next one.
pub struct Collector<S, K>
where
    S: ReportSource,
    K: SummarySink,
{
    source: S,
    sink: K,
    interval: Duration,
}

impl<S, K> Collector<S, K>
where
    S: ReportSource,
    K: SummarySink,
{
    pub fn new(source: S, sink: K, interval: Duration) -> Self {
        Self {
            source,
            sink,
            interval,
        }
    }

    /// Run cycles until the process is terminated. The first cycle starts
    /// immediately; a cycle that overruns the interval delays the next tick
    /// rather than bursting to catch up.
    pub async fn run(mut self) {
        info!(
            "Starting collection from {} every {}s into {}",
            self.source.name(),
            self.interval.as_secs(),
            self.sink.name()
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            self.run_cycle().await;
        }
    }

    /// One fetch-aggregate-persist pass. Every failure is contained here:
    /// the cycle is abandoned, the loop is not.
    pub async fn run_cycle(&mut self) {
        let reports = match self.source.fetch().await {
            Ok(reports) => reports,
            Err(e) => {
                error!("Fetch from {} failed: {}", self.source.name(), e);
                return;
            }
        };

        let summary = match aggregate(&reports) {
            Some(summary) => summary,
            None => {
                info!("No clients with usable smoke/interface data this cycle");
                return;
            }
        };

        info!(
            "Metrics computed: clients={}, avg bandwidth={:.2} Mbps, quality={:.2}%",
            summary.clients_reporting, summary.avg_bandwidth_mbps, summary.quality_score
        );

        match self.sink.persist(&summary).await {
            Ok(()) => info!("Summary saved to {}", self.sink.name()),
            Err(e) => {
                // Not retried within the cycle; the next cycle starts fresh.
                error!("Failed to save summary: {}", e);
            }
        }
    }

    /// The sink, for inspection after cycles have run.
    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }
}
