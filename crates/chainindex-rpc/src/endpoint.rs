//! Per-endpoint health tracking and selection (spec §4.1: "the pool tracks,
//! per endpoint, a rolling latency average and a consecutive-error count; an
//! endpoint with too many consecutive errors is taken out of rotation for a
//! cool-down period").

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Smoothing factor for the latency EMA. Lower is smoother.
const LATENCY_EMA_ALPHA: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct EndpointState {
    pub url: String,
    pub latency_ema_ms: Option<f64>,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
    pub chain_id_verified: bool,
    pub chain_id_mismatch: bool,
    down_until: Option<Instant>,
    last_success_at: Option<Instant>,
}

impl EndpointState {
    fn new(url: String) -> Self {
        Self {
            url,
            latency_ema_ms: None,
            consecutive_errors: 0,
            last_error: None,
            chain_id_verified: false,
            chain_id_mismatch: false,
            down_until: None,
            last_success_at: None,
        }
    }

    fn is_down(&self, now: Instant) -> bool {
        self.chain_id_mismatch || self.down_until.is_some_and(|until| now < until)
    }
}

/// Tracks the health of every configured endpoint for one upstream kind
/// (EL or CL) and selects the best candidate for the next call.
pub struct EndpointTable {
    endpoints: Mutex<Vec<EndpointState>>,
    max_consecutive_errors: u32,
    cooldown: Duration,
}

impl EndpointTable {
    pub fn new(urls: Vec<String>, max_consecutive_errors: u32, cooldown: Duration) -> Self {
        let endpoints = urls.into_iter().map(EndpointState::new).collect();
        Self { endpoints: Mutex::new(endpoints), max_consecutive_errors, cooldown }
    }

    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }

    /// Picks the not-down endpoint with the lowest latency EMA, breaking
    /// ties by most recent success (endpoints never successfully called are
    /// tried before a slow-but-proven one of equal unknown latency). Returns
    /// `None` when every endpoint is down (spec's "exhausted" condition).
    pub fn select(&self) -> Option<usize> {
        let now = Instant::now();
        let endpoints = self.endpoints.lock();
        endpoints
            .iter()
            .enumerate()
            .filter(|(_, state)| !state.is_down(now))
            .min_by(|(_, a), (_, b)| {
                let key = |state: &EndpointState| (state.latency_ema_ms.unwrap_or(f64::MAX), std::cmp::Reverse(state.last_success_at));
                key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx)
    }

    /// Selects an endpoint other than `exclude`, for the single fallback
    /// attempt spec §4.1 allows after the first failure.
    pub fn select_excluding(&self, exclude: usize) -> Option<usize> {
        let now = Instant::now();
        let endpoints = self.endpoints.lock();
        endpoints
            .iter()
            .enumerate()
            .filter(|(idx, state)| *idx != exclude && !state.is_down(now))
            .min_by(|(_, a), (_, b)| {
                let key = |state: &EndpointState| (state.latency_ema_ms.unwrap_or(f64::MAX), std::cmp::Reverse(state.last_success_at));
                key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx)
    }

    pub fn record_success(&self, idx: usize, latency: Duration) {
        let mut endpoints = self.endpoints.lock();
        let Some(state) = endpoints.get_mut(idx) else { return };
        let latency_ms = latency.as_secs_f64() * 1_000.0;
        state.latency_ema_ms = Some(match state.latency_ema_ms {
            Some(prev) => LATENCY_EMA_ALPHA * latency_ms + (1.0 - LATENCY_EMA_ALPHA) * prev,
            None => latency_ms,
        });
        state.consecutive_errors = 0;
        state.last_error = None;
        state.last_success_at = Some(Instant::now());
    }

    /// Records a transient failure; takes the endpoint out of rotation once
    /// `max_consecutive_errors` is reached, for `cooldown`.
    pub fn record_transient_error(&self, idx: usize, message: impl Into<String>) {
        let mut endpoints = self.endpoints.lock();
        let Some(state) = endpoints.get_mut(idx) else { return };
        state.consecutive_errors += 1;
        state.last_error = Some(message.into());
        if state.consecutive_errors >= self.max_consecutive_errors {
            state.down_until = Some(Instant::now() + self.cooldown);
        }
    }

    /// Marks an endpoint permanently out of rotation (e.g. chain-id
    /// mismatch); only a config reload can bring it back.
    pub fn mark_permanently_down(&self, idx: usize, message: impl Into<String>) {
        let mut endpoints = self.endpoints.lock();
        let Some(state) = endpoints.get_mut(idx) else { return };
        state.chain_id_mismatch = true;
        state.last_error = Some(message.into());
    }

    pub fn mark_chain_verified(&self, idx: usize) {
        let mut endpoints = self.endpoints.lock();
        if let Some(state) = endpoints.get_mut(idx) {
            state.chain_id_verified = true;
        }
    }

    pub fn is_chain_verified(&self, idx: usize) -> bool {
        self.endpoints.lock().get(idx).is_some_and(|state| state.chain_id_verified)
    }

    pub fn url(&self, idx: usize) -> Option<String> {
        self.endpoints.lock().get(idx).map(|state| state.url.clone())
    }

    pub fn all_down(&self) -> bool {
        let now = Instant::now();
        self.endpoints.lock().iter().all(|state| state.is_down(now))
    }

    pub fn snapshot(&self) -> Vec<EndpointState> {
        self.endpoints.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_lowest_latency_endpoint() {
        let table = EndpointTable::new(
            vec!["a".to_string(), "b".to_string()],
            5,
            Duration::from_secs(60),
        );
        table.record_success(0, Duration::from_millis(100));
        table.record_success(1, Duration::from_millis(10));
        assert_eq!(table.select(), Some(1));
    }

    #[test]
    fn endpoint_goes_down_after_max_consecutive_errors() {
        let table = EndpointTable::new(vec!["a".to_string()], 3, Duration::from_secs(60));
        for _ in 0..3 {
            table.record_transient_error(0, "boom");
        }
        assert!(table.all_down());
        assert_eq!(table.select(), None);
    }

    #[test]
    fn success_resets_consecutive_error_count() {
        let table = EndpointTable::new(vec!["a".to_string()], 3, Duration::from_secs(60));
        table.record_transient_error(0, "boom");
        table.record_transient_error(0, "boom");
        table.record_success(0, Duration::from_millis(5));
        assert_eq!(table.snapshot()[0].consecutive_errors, 0);
    }

    #[test]
    fn chain_id_mismatch_is_permanent() {
        let table = EndpointTable::new(vec!["a".to_string()], 3, Duration::from_secs(60));
        table.mark_permanently_down(0, "chain id mismatch: expected 137, got 1");
        assert!(table.all_down());
    }

    #[test]
    fn select_excluding_skips_the_given_index() {
        let table = EndpointTable::new(
            vec!["a".to_string(), "b".to_string()],
            5,
            Duration::from_secs(60),
        );
        assert_eq!(table.select_excluding(0), Some(1));
    }
}
