//! Process metrics / 进程指标
//!
//! Plain atomics rendered in the Prometheus text exposition format.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bounds (seconds) of the search latency histogram
const DURATION_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

#[derive(Debug, Default)]
struct Histogram {
    buckets: [AtomicU64; DURATION_BUCKETS.len()],
    count: AtomicU64,
    sum_micros: AtomicU64,
}

impl Histogram {
    fn observe(&self, value: Duration) {
        let secs = value.as_secs_f64();
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            if secs <= *bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(value.as_micros() as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    api_requests: AtomicU64,
    searches: AtomicU64,
    searches_with_results: AtomicU64,
    search_duration: Histogram,
    fulltext_fallbacks: AtomicU64,
    local_failures: AtomicU64,
    enrichment_errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    http_requests: Mutex<BTreeMap<(String, u16), u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_api_request(&self) {
        self.api_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_search(&self, elapsed: Duration, result_count: usize) {
        self.searches.fetch_add(1, Ordering::Relaxed);
        if result_count > 0 {
            self.searches_with_results.fetch_add(1, Ordering::Relaxed);
        }
        self.search_duration.observe(elapsed);
    }

    pub fn record_fulltext_fallback(&self) {
        self.fulltext_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_failure(&self) {
        self.local_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrichment_error(&self) {
        self.enrichment_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one HTTP response by route template and status code
    pub fn record_http(&self, path: &str, code: u16) {
        let mut map = self.http_requests.lock();
        *map.entry((path.to_string(), code)).or_insert(0) += 1;
    }

    pub fn api_requests(&self) -> u64 {
        self.api_requests.load(Ordering::Relaxed)
    }

    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    pub fn searches_with_results(&self) -> u64 {
        self.searches_with_results.load(Ordering::Relaxed)
    }

    pub fn fulltext_fallbacks(&self) -> u64 {
        self.fulltext_fallbacks.load(Ordering::Relaxed)
    }

    pub fn local_failures(&self) -> u64 {
        self.local_failures.load(Ordering::Relaxed)
    }

    pub fn enrichment_errors(&self) -> u64 {
        self.enrichment_errors.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn http_requests(&self, path: &str, code: u16) -> u64 {
        self.http_requests
            .lock()
            .get(&(path.to_string(), code))
            .copied()
            .unwrap_or(0)
    }

    /// Render all series in Prometheus text format
    pub fn render(&self) -> String {
        let mut out = String::new();

        counter(&mut out, "whoknows_requests_total", "Total API requests", self.api_requests());
        counter(&mut out, "app_search_total", "Total searches executed", self.searches());
        counter(
            &mut out,
            "app_search_with_result_total",
            "Searches that returned at least one result",
            self.searches_with_results(),
        );
        counter(
            &mut out,
            "app_search_fulltext_fallback_total",
            "Full-text searches answered by the substring fallback",
            self.fulltext_fallbacks(),
        );
        counter(
            &mut out,
            "app_search_local_failures_total",
            "Local search phases that failed or timed out",
            self.local_failures(),
        );
        counter(
            &mut out,
            "app_search_enrichment_errors_total",
            "Failed enrichment source calls",
            self.enrichment_errors(),
        );
        counter(&mut out, "app_search_cache_hits_total", "Enrichment cache hits", self.cache_hits());
        counter(&mut out, "app_search_cache_misses_total", "Enrichment cache misses", self.cache_misses());

        let h = &self.search_duration;
        let _ = writeln!(out, "# HELP app_search_duration_seconds Search latency in seconds");
        let _ = writeln!(out, "# TYPE app_search_duration_seconds histogram");
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            let _ = writeln!(
                out,
                "app_search_duration_seconds_bucket{{le=\"{}\"}} {}",
                bound,
                h.buckets[i].load(Ordering::Relaxed)
            );
        }
        let count = h.count.load(Ordering::Relaxed);
        let _ = writeln!(out, "app_search_duration_seconds_bucket{{le=\"+Inf\"}} {}", count);
        let _ = writeln!(
            out,
            "app_search_duration_seconds_sum {}",
            h.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
        );
        let _ = writeln!(out, "app_search_duration_seconds_count {}", count);

        let _ = writeln!(out, "# HELP app_http_requests_total HTTP responses by route and status");
        let _ = writeln!(out, "# TYPE app_http_requests_total counter");
        for ((path, code), value) in self.http_requests.lock().iter() {
            let _ = writeln!(
                out,
                "app_http_requests_total{{path=\"{}\",code=\"{}\"}} {}",
                escape_label(path),
                code,
                value
            );
        }

        out
    }
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    let _ = writeln!(out, "{} {}", name, value);
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
