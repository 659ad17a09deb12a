//! # Supervisor
//!
//! Keeps exactly one collector running per attached sensor port.
//!
//! Each poll compares the matcher's answer with the running set:
//! - present but not running: start a collector and register it
//! - running but absent: cancel the collector, wait for it, unregister it
//!
//! The downlink aggregator is registered under the downlink port's name when the
//! supervisor starts. That entry is exempt from detach handling, so it runs until
//! shutdown whatever the matcher reports.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::collector::{Collector, CollectorContext};
use crate::device::DeviceMatcher;
use crate::downlink::DownlinkAggregator;
use crate::worker::{pause, WorkerEntry};

/// Attach or detach observed during one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Attached(String),
    Detached(String),
}

/// Owner of every worker in the process
pub struct Supervisor<M> {
    matcher: M,
    ctx: CollectorContext,
    workers: HashMap<String, WorkerEntry>,
    reserved: String,
    poll_interval: Duration,
}

impl<M: DeviceMatcher> Supervisor<M> {
    /// Spawn the downlink aggregator and return a supervisor with no collectors yet
    pub fn start(
        matcher: M,
        ctx: CollectorContext,
        downlink: DownlinkAggregator,
        poll_interval: Duration,
    ) -> Self {
        let reserved = downlink.transport().port().to_string();
        let mut workers = HashMap::new();
        workers.insert(reserved.clone(), WorkerEntry::spawn(|cancel| downlink.run(cancel)));
        info!("Downlink worker registered as {}", reserved);

        Self {
            matcher,
            ctx,
            workers,
            reserved,
            poll_interval,
        }
    }

    /// Name of the downlink entry that attach/detach never touches
    pub fn reserved_entry(&self) -> &str {
        &self.reserved
    }

    /// Names of every registered worker, including the downlink entry
    pub fn running(&self) -> BTreeSet<String> {
        self.workers.keys().cloned().collect()
    }

    /// Reconcile the running set with the attached devices once
    pub async fn poll_once(&mut self) -> Vec<LifecycleEvent> {
        let present = self.matcher.detect();
        let mut events = Vec::new();

        let attached: Vec<String> = present
            .iter()
            .filter(|device| !self.workers.contains_key(*device))
            .cloned()
            .collect();
        for device in attached {
            self.attach(&device);
            events.push(LifecycleEvent::Attached(device));
        }

        let detached: Vec<String> = self
            .workers
            .keys()
            .filter(|device| {
                !present.contains(*device) && device.as_str() != self.reserved_entry()
            })
            .cloned()
            .collect();
        for device in detached {
            self.detach(&device).await;
            events.push(LifecycleEvent::Detached(device));
        }

        events
    }

    fn attach(&mut self, device: &str) {
        error!(severity = "critical", "UART port {} connected", device);

        let collector = Collector::new(device, self.ctx.clone());
        self.workers
            .insert(device.to_string(), WorkerEntry::spawn(|cancel| collector.run(cancel)));

        info!("Collector for UART port {} started.", device);
    }

    async fn detach(&mut self, device: &str) {
        error!(severity = "critical", "UART port {} disconnected", device);

        if let Some(entry) = self.workers.remove(device) {
            if let Err(e) = entry.stop().await {
                error!("Collector for UART port {} ended abnormally: {}", device, e);
            }
        }
    }

    /// Poll until `shutdown` is raised, then stop every worker
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Supervising sensor ports every {:?}", self.poll_interval);

        loop {
            self.poll_once().await;
            if pause(&shutdown, self.poll_interval).await {
                break;
            }
        }

        self.shutdown().await;
    }

    /// Cancel all workers at once, then join them
    pub async fn shutdown(&mut self) {
        for entry in self.workers.values() {
            entry.cancel();
        }

        for (name, entry) in self.workers.drain() {
            if let Err(e) = entry.stop().await {
                error!("Worker {} ended abnormally: {}", name, e);
            }
        }

        info!("All workers stopped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorTiming;
    use crate::config::DownlinkConfig;
    use crate::device::MockDeviceMatcher;
    use crate::downlink::DownlinkTransport;
    use crate::serial::port_trait::mocks::MockOpener;
    use crate::telemetry::{AggregationStore, DailyCsvLog};
    use mockall::Sequence;
    use std::path::Path;
    use std::sync::Arc;

    const SENSOR: &str = "/dev/ttyUSB0";
    const DOWNLINK: &str = "/dev/ttyS0";

    fn devices(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn supervisor(
        matcher: MockDeviceMatcher,
        opener: &MockOpener,
        dir: &Path,
        downlink_interval_ms: u64,
    ) -> Supervisor<MockDeviceMatcher> {
        let store = Arc::new(AggregationStore::new());
        let ctx = CollectorContext {
            opener: Arc::new(opener.clone()),
            store: Arc::clone(&store),
            csv_log: DailyCsvLog::new(dir),
            baud_rate: 9600,
            timing: CollectorTiming {
                idle_interval: Duration::from_millis(5),
                error_backoff: Duration::from_millis(10),
            },
        };
        let config = DownlinkConfig {
            interval_ms: downlink_interval_ms,
            error_backoff_ms: 5,
            ..DownlinkConfig::default()
        };
        let transport = DownlinkTransport::new(Arc::new(opener.clone()), DOWNLINK, 1200);
        let downlink = DownlinkAggregator::new(store, transport, &config);

        Supervisor::start(matcher, ctx, downlink, Duration::from_millis(10))
    }

    fn scripted(results: Vec<BTreeSet<String>>) -> MockDeviceMatcher {
        let mut matcher = MockDeviceMatcher::new();
        let mut seq = Sequence::new();
        for result in results {
            matcher
                .expect_detect()
                .times(1)
                .in_sequence(&mut seq)
                .return_once(move || result);
        }
        matcher
    }

    #[tokio::test]
    async fn test_attach_then_detach_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let opener = MockOpener::new();
        let matcher = scripted(vec![devices(&[]), devices(&[SENSOR]), devices(&[])]);
        let mut supervisor = supervisor(matcher, &opener, dir.path(), 60_000);

        let mut events = Vec::new();
        events.extend(supervisor.poll_once().await);
        events.extend(supervisor.poll_once().await);
        assert_eq!(supervisor.running(), devices(&[DOWNLINK, SENSOR]));
        events.extend(supervisor.poll_once().await);

        assert_eq!(
            events,
            vec![
                LifecycleEvent::Attached(SENSOR.to_string()),
                LifecycleEvent::Detached(SENSOR.to_string()),
            ]
        );
        assert_eq!(supervisor.running(), devices(&[DOWNLINK]));

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_running_device_is_not_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let opener = MockOpener::new();
        let matcher = scripted(vec![devices(&[SENSOR]), devices(&[SENSOR]), devices(&[SENSOR])]);
        let mut supervisor = supervisor(matcher, &opener, dir.path(), 60_000);

        let first = supervisor.poll_once().await;
        assert_eq!(first.len(), 1);
        assert!(supervisor.poll_once().await.is_empty());
        assert!(supervisor.poll_once().await.is_empty());

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_reserved_entry_survives_any_matcher_result() {
        let dir = tempfile::tempdir().unwrap();
        let opener = MockOpener::new();
        let matcher = scripted(vec![
            devices(&[]),
            devices(&[DOWNLINK]),
            devices(&[SENSOR, "/dev/ttyUSB1"]),
            devices(&[]),
        ]);
        let mut supervisor = supervisor(matcher, &opener, dir.path(), 60_000);
        assert_eq!(supervisor.reserved_entry(), DOWNLINK);

        for _ in 0..4 {
            let events = supervisor.poll_once().await;
            assert!(!events.contains(&LifecycleEvent::Detached(DOWNLINK.to_string())));
            assert!(!events.contains(&LifecycleEvent::Attached(DOWNLINK.to_string())));
            assert!(supervisor.running().contains(DOWNLINK));
        }
        assert_eq!(supervisor.running(), devices(&[DOWNLINK]));

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_simultaneous_attach_and_detach() {
        let dir = tempfile::tempdir().unwrap();
        let opener = MockOpener::new();
        let matcher = scripted(vec![
            devices(&["/dev/ttyUSB0", "/dev/ttyUSB1"]),
            devices(&["/dev/ttyUSB1", "/dev/ttyUSB2"]),
        ]);
        let mut supervisor = supervisor(matcher, &opener, dir.path(), 60_000);

        supervisor.poll_once().await;
        let events = supervisor.poll_once().await;

        assert!(events.contains(&LifecycleEvent::Attached("/dev/ttyUSB2".to_string())));
        assert!(events.contains(&LifecycleEvent::Detached("/dev/ttyUSB0".to_string())));
        assert_eq!(events.len(), 2);
        assert_eq!(supervisor.running(), devices(&[DOWNLINK, "/dev/ttyUSB1", "/dev/ttyUSB2"]));

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_sensor_line_reaches_log_and_downlink() {
        let dir = tempfile::tempdir().unwrap();
        let opener = MockOpener::new();

        let mut payload = vec!["KEY", "STATIONA", "TempC", "21.5"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        while payload.len() < 19 {
            payload.push(format!("V{}", payload.len()));
        }
        let line = payload.join(",");
        opener.push_line(SENSOR, &line);

        let mut matcher = MockDeviceMatcher::new();
        matcher.expect_detect().returning(|| devices(&[SENSOR]));
        let mut supervisor = supervisor(matcher, &opener, dir.path(), 10);
        supervisor.poll_once().await;

        let mut sent = false;
        for _ in 0..400 {
            if opener
                .writer
                .get_written_strings()
                .iter()
                .any(|m| m.contains("STATIONA21.5"))
            {
                sent = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        supervisor.shutdown().await;
        assert!(sent, "downlink never carried STATIONA21.5");

        let logs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(logs.len(), 1);
        let name = logs[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_devttyUSB0.csv"));

        let contents = std::fs::read_to_string(&logs[0]).unwrap();
        assert!(contents.starts_with("#/dev/ttyUSB0,"));
        assert!(contents.trim_end().ends_with(&format!(",{}", line)));
    }

    #[tokio::test]
    async fn test_run_stops_all_workers_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let opener = MockOpener::new();
        let mut matcher = MockDeviceMatcher::new();
        matcher.expect_detect().returning(|| devices(&[SENSOR]));
        let supervisor = supervisor(matcher, &opener, dir.path(), 60_000);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(supervisor.run(shutdown.clone()));

        for _ in 0..200 {
            if opener.reader_opens(SENSOR) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("supervisor did not stop")
            .unwrap();
        assert_eq!(opener.reader_opens(SENSOR), 1);
    }
}
