use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::report::domain::report::Report;
use crate::report::domain::report_sink::ReportSink;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Fire-and-forget delivery of reports on a background worker.
///
/// `dispatch` only enqueues; every queued report goes to every sink in
/// order. Failures are logged at `error` and counted, never retried.
/// `shutdown` (or drop) waits for the queue to drain.
pub struct ReportDispatcher {
    tx: Option<Sender<Report>>,
    worker: Option<JoinHandle<DeliveryStats>>,
}

impl ReportDispatcher {
    pub fn new(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Report>();

        let worker = std::thread::spawn(move || {
            let mut stats = DeliveryStats::default();
            for report in rx {
                for sink in &sinks {
                    match sink.deliver(&report) {
                        Ok(()) => stats.delivered += 1,
                        Err(e) => {
                            log::error!("Report delivery via {} failed: {e}", sink.name());
                            stats.failed += 1;
                        }
                    }
                }
            }
            stats
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    pub fn dispatch(&self, report: Report) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(report).is_err() {
            log::error!("Report worker is gone; report dropped");
        }
    }

    /// Closes the queue and waits for pending deliveries.
    pub fn shutdown(mut self) -> DeliveryStats {
        self.finish()
    }

    fn finish(&mut self) -> DeliveryStats {
        self.tx = None;
        match self.worker.take().map(|w| w.join()) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                log::error!("Report worker panicked");
                DeliveryStats::default()
            }
            None => DeliveryStats::default(),
        }
    }
}

impl Drop for ReportDispatcher {
    fn drop(&mut self) {
        self.finish();
    }
}
