//! Boundary counters.

use axum::http::StatusCode;
use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every boundary.
#[derive(Debug, Default)]
pub struct ShieldMetrics {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    preflights: AtomicU64,
    method_rejections: AtomicU64,
    csrf_rejections: AtomicU64,
    unauthenticated: AtomicU64,
    refreshes: AtomicU64,
    backend_failures: AtomicU64,
    hook_failures: AtomicU64,
    status_2xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    latency_ms_total: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub preflights: u64,
    pub method_rejections: u64,
    pub csrf_rejections: u64,
    pub unauthenticated: u64,
    pub refreshes: u64,
    pub backend_failures: u64,
    pub hook_failures: u64,
    pub status_2xx: u64,
    pub status_4xx: u64,
    pub status_5xx: u64,
    pub avg_latency_ms: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl ShieldMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal response.
    pub fn record_response(&self, status: StatusCode, latency_ms: u64) {
        bump(&self.requests);
        self.latency_ms_total.fetch_add(latency_ms, Ordering::Relaxed);

        if status.is_success() {
            bump(&self.status_2xx);
        } else if status.is_client_error() {
            bump(&self.status_4xx);
        } else if status.is_server_error() {
            bump(&self.status_5xx);
        }
    }

    pub fn record_success(&self) {
        bump(&self.successes);
    }

    pub fn record_failure(&self) {
        bump(&self.failures);
    }

    pub fn record_preflight(&self) {
        bump(&self.preflights);
    }

    pub fn record_method_rejection(&self) {
        bump(&self.method_rejections);
    }

    pub fn record_csrf_rejection(&self) {
        bump(&self.csrf_rejections);
    }

    pub fn record_unauthenticated(&self) {
        bump(&self.unauthenticated);
    }

    pub fn record_refresh(&self) {
        bump(&self.refreshes);
    }

    pub fn record_backend_failure(&self) {
        bump(&self.backend_failures);
    }

    pub fn record_hook_failure(&self) {
        bump(&self.hook_failures);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let requests = load(&self.requests);

        MetricsSnapshot {
            requests,
            successes: load(&self.successes),
            failures: load(&self.failures),
            preflights: load(&self.preflights),
            method_rejections: load(&self.method_rejections),
            csrf_rejections: load(&self.csrf_rejections),
            unauthenticated: load(&self.unauthenticated),
            refreshes: load(&self.refreshes),
            backend_failures: load(&self.backend_failures),
            hook_failures: load(&self.hook_failures),
            status_2xx: load(&self.status_2xx),
            status_4xx: load(&self.status_4xx),
            status_5xx: load(&self.status_5xx),
            avg_latency_ms: load(&self.latency_ms_total).checked_div(requests).unwrap_or(0),
        }
    }

    /// Prometheus text exposition of the counters.
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        let counters = [
            ("requests_total", "Terminal responses", s.requests),
            ("success_total", "Handler successes", s.successes),
            ("failure_total", "Classified handler failures", s.failures),
            ("preflight_total", "Preflight responses", s.preflights),
            ("method_rejected_total", "Requests with a disallowed method", s.method_rejections),
            ("csrf_rejected_total", "Requests failing the CSRF check", s.csrf_rejections),
            ("unauthenticated_total", "Requests rejected for lack of a session", s.unauthenticated),
            ("session_refresh_total", "Sessions refreshed", s.refreshes),
            ("session_backend_failure_total", "Session backend failures", s.backend_failures),
            ("error_hook_failure_total", "Error hook failures", s.hook_failures),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP stageflow_shield_{} {}", name, help);
            let _ = writeln!(out, "# TYPE stageflow_shield_{} counter", name);
            let _ = writeln!(out, "stageflow_shield_{} {}", name, value);
        }

        let _ = writeln!(out, "# HELP stageflow_shield_responses_total Responses by status class");
        let _ = writeln!(out, "# TYPE stageflow_shield_responses_total counter");
        for (class, value) in [("2xx", s.status_2xx), ("4xx", s.status_4xx), ("5xx", s.status_5xx)] {
            let _ = writeln!(out, "stageflow_shield_responses_total{{class=\"{}\"}} {}", class, value);
        }

        out
    }
}
