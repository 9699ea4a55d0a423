//! Prometheus metrics collection.
//!
//! Counters for lifecycle transitions, scheduler ticks, snapshots and
//! optimistic-concurrency conflicts, plus HTTP request metrics.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

use crate::content::Trigger;
use crate::cron::TickSummary;
use crate::models::PageStatus;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Lifecycle transition labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TransitionLabels {
    pub to: String,
    pub trigger: String,
}

/// Scheduler tick outcome labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TickLabels {
    pub outcome: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// HTTP request counter by method/path/status.
    pub http_requests: Family<HttpLabels, Counter>,

    /// HTTP request duration histogram.
    pub http_duration_seconds: Family<HttpLabels, Histogram>,

    /// Applied lifecycle transitions by target status and trigger.
    pub transitions: Family<TransitionLabels, Counter>,

    /// Pages handled by scheduler ticks, by outcome.
    pub tick_pages: Family<TickLabels, Counter>,

    /// Completed scheduler ticks.
    pub ticks: Counter,

    /// Scheduler tick duration.
    pub tick_duration_seconds: Histogram,

    /// Versions recorded.
    pub snapshots: Counter,

    /// Saves refused because of a stale revision.
    pub revision_conflicts: Counter,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total HTTP requests",
            http_requests.clone(),
        );

        let http_duration_seconds = Family::<HttpLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 12))
        });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_duration_seconds.clone(),
        );

        let transitions = Family::<TransitionLabels, Counter>::default();
        registry.register(
            "page_transitions",
            "Applied page lifecycle transitions",
            transitions.clone(),
        );

        let tick_pages = Family::<TickLabels, Counter>::default();
        registry.register(
            "scheduler_tick_pages",
            "Pages handled by scheduler ticks",
            tick_pages.clone(),
        );

        let ticks = Counter::default();
        registry.register("scheduler_ticks", "Completed scheduler ticks", ticks.clone());

        let tick_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        registry.register(
            "scheduler_tick_duration_seconds",
            "Scheduler tick duration in seconds",
            tick_duration_seconds.clone(),
        );

        let snapshots = Counter::default();
        registry.register(
            "page_versions_created",
            "Page versions recorded",
            snapshots.clone(),
        );

        let revision_conflicts = Counter::default();
        registry.register(
            "page_revision_conflicts",
            "Saves refused because of a stale revision",
            revision_conflicts.clone(),
        );

        Self {
            registry,
            http_requests,
            http_duration_seconds,
            transitions,
            tick_pages,
            ticks,
            tick_duration_seconds,
            snapshots,
            revision_conflicts,
        }
    }

    /// Record an HTTP request.
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: normalize_path(path),
            status,
        };

        self.http_requests.get_or_create(&labels).inc();
        self.http_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record an applied lifecycle transition.
    pub fn record_transition(&self, to: PageStatus, trigger: Trigger) {
        let labels = TransitionLabels {
            to: to.as_str().to_string(),
            trigger: trigger.as_str().to_string(),
        };
        self.transitions.get_or_create(&labels).inc();
    }

    /// Record the outcome of a scheduler tick.
    pub fn record_tick(&self, summary: &TickSummary) {
        self.ticks.inc();
        self.tick_duration_seconds
            .observe(summary.duration_ms as f64 / 1000.0);
        for (outcome, count) in [
            ("published", summary.published),
            ("archived", summary.archived),
            ("awaiting_approval", summary.awaiting_approval),
            ("failed", summary.failed),
            ("skipped", summary.skipped),
        ] {
            if count > 0 {
                let labels = TickLabels {
                    outcome: outcome.to_string(),
                };
                self.tick_pages.get_or_create(&labels).inc_by(count);
            }
        }
    }

    /// Record a new page version.
    pub fn record_snapshot(&self) {
        self.snapshots.inc();
    }

    /// Record a stale-revision conflict.
    pub fn record_conflict(&self) {
        self.revision_conflicts.inc();
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Panics
    ///
    /// Panics if Prometheus metric encoding to a `String` buffer fails.
    /// The `fmt::Write` impl for `String` is infallible.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Prometheus encoding to String buffer is infallible
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

/// Normalize a path for metrics labels.
///
/// Replaces dynamic segments (UUIDs, numbers) with placeholders to limit
/// cardinality. Anything under `/cron/` collapses so the key never appears.
fn normalize_path(path: &str) -> String {
    if path.starts_with("/cron/") {
        return "/cron/{key}".to_string();
    }
    path.split('/')
        .map(|s| {
            if uuid::Uuid::parse_str(s).is_ok()
                || (!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            {
                "{id}"
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
