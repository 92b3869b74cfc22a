//! Prometheus metrics for the market maker.
//!
//! Covers transport state, order evaluation outcomes, the fill lifecycle,
//! feed health and liquidity publishing.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error surfaced on first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, register_int_gauge, CounterVec,
    Gauge, HistogramVec, IntGauge,
};

/// WebSocket connection state (1 = connected, 0 = disconnected).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("zz_ws_connected", "WebSocket connection state (1=connected)").unwrap()
});

/// Order evaluations by outcome.
/// Labels: result (fillable / reject reason)
pub static EVALUATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "zz_evaluations_total",
        "Incoming order evaluations by outcome",
        &["result"]
    )
    .unwrap()
});

/// Fill requests sent.
pub static FILL_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "zz_fill_requests_total",
        "Fill requests sent to the exchange",
        &["market"]
    )
    .unwrap()
});

/// Fills reaching a terminal state.
/// Labels: market, status (filled / rejected)
pub static FILLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "zz_fills_total",
        "Fills reaching a terminal state",
        &["market", "status"]
    )
    .unwrap()
});

/// Match-to-terminal latency in milliseconds.
pub static SETTLEMENT_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "zz_settlement_latency_ms",
        "Time from match to settlement result in milliseconds",
        &["status"],
        vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0]
    )
    .unwrap()
});

/// Markets blocked by the feed divergence breaker.
pub static CIRCUIT_BREAKER_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "zz_circuit_breaker_total",
        "Feed divergence breaker trips",
        &["market"]
    )
    .unwrap()
});

/// Liquidity ladders published.
pub static LIQUIDITY_PUBLISHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "zz_liquidity_published_total",
        "Liquidity indications sent",
        &["market", "kind"]
    )
    .unwrap()
});

/// Wallets currently holding the broadcasting lock.
pub static WALLETS_LOCKED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "zz_wallets_locked",
        "Wallets currently holding the broadcasting lock"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record WebSocket connected.
    pub fn ws_connected() {
        WS_CONNECTED.set(1.0);
    }

    /// Record WebSocket disconnected.
    pub fn ws_disconnected() {
        WS_CONNECTED.set(0.0);
    }

    pub fn evaluation(result: &str) {
        EVALUATIONS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn fill_requested(market: &str) {
        FILL_REQUESTS_TOTAL.with_label_values(&[market]).inc();
    }

    /// Record a terminal fill; `latency_ms` is measured from the match.
    pub fn fill_finished(market: &str, status: &str, latency_ms: Option<f64>) {
        FILLS_TOTAL.with_label_values(&[market, status]).inc();
        if let Some(latency) = latency_ms {
            SETTLEMENT_LATENCY_MS
                .with_label_values(&[status])
                .observe(latency);
        }
    }

    pub fn circuit_breaker(market: &str) {
        CIRCUIT_BREAKER_TOTAL.with_label_values(&[market]).inc();
    }

    /// `kind` is `ladder` or `cancel`.
    pub fn liquidity_published(market: &str, kind: &str) {
        LIQUIDITY_PUBLISHED_TOTAL
            .with_label_values(&[market, kind])
            .inc();
    }

    pub fn wallets_locked(count: usize) {
        WALLETS_LOCKED.set(count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_gauge() {
        Metrics::ws_connected();
        assert_eq!(WS_CONNECTED.get(), 1.0);
        Metrics::ws_disconnected();
        assert_eq!(WS_CONNECTED.get(), 0.0);
    }

    #[test]
    fn test_fill_counters() {
        let before = FILLS_TOTAL
            .with_label_values(&["TEST-MKT", "filled"])
            .get();
        Metrics::fill_finished("TEST-MKT", "filled", Some(1200.0));
        assert_eq!(
            FILLS_TOTAL.with_label_values(&["TEST-MKT", "filled"]).get(),
            before + 1.0
        );
    }

    #[test]
    fn test_wallets_locked_gauge() {
        Metrics::wallets_locked(3);
        assert_eq!(WALLETS_LOCKED.get(), 3);
    }
}
