use super::DataSource;
use crate::domain::{Range, Series};
use crate::error::DashboardError;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) struct FakeSource {
    name: &'static str,
    values: Vec<f64>,
    failure: Mutex<Option<DashboardError>>,
    delay: Duration,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeSource {
    pub(crate) fn with_values(values: &[f64]) -> Self {
        Self {
            name: "fake",
            values: values.to_vec(),
            failure: Mutex::new(None),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn fail_with(&self, err: DashboardError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub(crate) fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DataSource for FakeSource {
    fn source_name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, symbol: &str, _range: Range) -> Result<Series, DashboardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(symbol.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Ok(Series::from_values(
            symbol,
            self.values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + ChronoDuration::days(i as i64), *v)),
        ))
    }
}
