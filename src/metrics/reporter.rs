use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::influx::{FieldValue, InfluxSink, Point};
use crate::metrics::registry::CounterRegistry;

/// Incremental activity since the previous snapshot, per counter.
pub fn diff_snapshot(
    current: &HashMap<String, u64>,
    last: &HashMap<String, u64>,
) -> BTreeMap<String, i64> {
    current
        .iter()
        .map(|(name, value)| {
            let previous = last.get(name).copied().unwrap_or(0);
            (name.clone(), *value as i64 - previous as i64)
        })
        .collect()
}

/// Periodic publisher of counter deltas.
///
/// Each tick reads the cumulative counters, reports the difference against
/// the previous snapshot, then overwrites the snapshot so no activity is
/// counted twice. The first tick diffs against a zero baseline. The stop
/// signal is only observed between ticks; a tick in flight always
/// completes and publishes. On stop, a close record with the shutdown
/// reason is written before returning.
pub struct Reporter {
    registry: Arc<CounterRegistry>,
    sink: InfluxSink,
    worker_name: String,
    interval: Duration,
    last: HashMap<String, u64>,
    seen_keys: BTreeSet<String>,
}

impl Reporter {
    pub fn new(
        registry: Arc<CounterRegistry>,
        sink: InfluxSink,
        worker_name: String,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            sink,
            worker_name,
            interval,
            last: HashMap::new(),
            seen_keys: BTreeSet::new(),
        }
    }

    pub async fn run(mut self, mut stop: watch::Receiver<Option<String>>) -> Result<()> {
        self.write_lifecycle("worker_opened", None).await?;
        info!(worker = %self.worker_name, "metrics reporter started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first interval tick fires immediately; skip it so the first
        // report covers a full interval
        ticker.tick().await;

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => self.report_tick().await?,
                changed = stop.changed() => {
                    if changed.is_err() {
                        break "shutdown channel closed".to_string();
                    }
                    if let Some(reason) = stop.borrow_and_update().clone() {
                        break reason;
                    }
                }
            }
        };

        self.write_lifecycle("worker_closed", Some(&reason)).await?;
        info!(worker = %self.worker_name, reason = %reason, "metrics reporter stopped");

        Ok(())
    }

    async fn report_tick(&mut self) -> Result<()> {
        let current = self.registry.snapshot();
        let deltas = diff_snapshot(&current, &self.last);
        self.last = current;

        // diagnostic record of every counter name ever observed; does not
        // feed the diff
        self.seen_keys.extend(deltas.keys().cloned());
        debug!(counters = self.seen_keys.len(), "reporting deltas");

        let point = Point {
            measurement: "worker_stats".to_string(),
            timestamp: Utc::now(),
            tags: vec![("worker_name".to_string(), self.worker_name.clone())],
            fields: deltas
                .into_iter()
                .map(|(name, delta)| (name, FieldValue::Integer(delta)))
                .collect(),
        };

        self.sink.write_point(&point).await
    }

    async fn write_lifecycle(&self, measurement: &str, reason: Option<&str>) -> Result<()> {
        let now = Utc::now();
        let mut fields = vec![
            (
                if reason.is_some() { "end_time" } else { "start_time" }.to_string(),
                FieldValue::Text(now.format("%Y-%m-%d %H:%M:%S").to_string()),
            ),
            (
                "worker_name".to_string(),
                FieldValue::Text(self.worker_name.clone()),
            ),
        ];
        if let Some(reason) = reason {
            fields.push(("reason".to_string(), FieldValue::Text(reason.to_string())));
        }

        let point = Point {
            measurement: measurement.to_string(),
            timestamp: now,
            tags: vec![("worker_name".to_string(), self.worker_name.clone())],
            fields,
        };

        self.sink.write_point(&point).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::MetricsSettings;
    use crate::error::Error;
    use crate::metrics::registry::counter;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snapshot_of(value: u64) -> HashMap<String, u64> {
        HashMap::from([("requested".to_string(), value)])
    }

    #[test]
    fn deltas_never_double_count() {
        // cumulative sequence [10, 35, 35, 60] must report [10, 25, 0, 25]
        let mut last = HashMap::new();
        let mut reported = Vec::new();

        for cumulative in [10, 35, 35, 60] {
            let current = snapshot_of(cumulative);
            let deltas = diff_snapshot(&current, &last);
            reported.push(deltas["requested"]);
            last = current;
        }

        assert_eq!(reported, vec![10, 25, 0, 25]);
    }

    #[test]
    fn first_diff_uses_zero_baseline() {
        let deltas = diff_snapshot(&snapshot_of(7), &HashMap::new());
        assert_eq!(deltas["requested"], 7);
    }

    fn reporter_with(server_uri: &str, registry: Arc<CounterRegistry>) -> Reporter {
        let sink = InfluxSink::new(&MetricsSettings {
            influx_url: server_uri.to_string(),
            database: "spider".to_string(),
            interval: 1,
        })
        .unwrap();

        Reporter::new(registry, sink, "spider".to_string(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn run_emits_lifecycle_records_and_honors_stop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(body_string_contains("worker_opened"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(body_string_contains("worker_closed"))
            .and(body_string_contains("reason=\"engine stopped\""))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let reporter = reporter_with(&server.uri(), Arc::new(CounterRegistry::new()));
        let (stop_tx, stop_rx) = watch::channel(None);

        let handle = tokio::spawn(reporter.run(stop_rx));
        stop_tx.send(Some("engine stopped".to_string())).unwrap();

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn tick_reports_deltas_and_sink_rejection_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(body_string_contains("requested=3i"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let registry = Arc::new(CounterRegistry::new());
        registry.add(counter::REQUESTED, 3);

        let mut reporter = reporter_with(&server.uri(), registry.clone());
        reporter.report_tick().await.unwrap();

        // same cumulative value on the next tick: delta drops to zero
        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(body_string_contains("requested=0i"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        reporter.report_tick().await.unwrap();

        // a broken sink must abort the loop, not be skipped
        server.reset().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let err = reporter.report_tick().await.unwrap_err();
        assert!(matches!(err, Error::SinkWrite(_)));
    }
}
