use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Points for one symbol, ascending by timestamp, one point per timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    symbol: String,
    points: Vec<MetricPoint>,
}

impl Series {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            points: Vec::new(),
        }
    }

    /// Sorts by timestamp, drops non-finite values and keeps the later-supplied
    /// point when two share a timestamp. Every point is re-tagged with `symbol`.
    pub fn from_points(symbol: impl Into<String>, points: Vec<MetricPoint>) -> Self {
        let symbol = symbol.into();
        let mut points: Vec<MetricPoint> = points
            .into_iter()
            .filter(|p| p.value.is_finite())
            .map(|mut p| {
                p.symbol.clone_from(&symbol);
                p
            })
            .collect();

        // Stable sort keeps supply order among equal timestamps; reverse so the
        // later-supplied duplicate comes first and survives dedup.
        points.reverse();
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);

        Self { symbol, points }
    }

    pub fn from_values(
        symbol: impl Into<String>,
        values: impl IntoIterator<Item = (DateTime<Utc>, f64)>,
    ) -> Self {
        let symbol = symbol.into();
        let points = values
            .into_iter()
            .map(|(timestamp, value)| MetricPoint {
                symbol: symbol.clone(),
                timestamp,
                value,
            })
            .collect();
        Self::from_points(symbol, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&MetricPoint> {
        self.points.last()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    pub fn tail(&self, n: usize) -> Series {
        let start = self.points.len().saturating_sub(n);
        Series {
            symbol: self.symbol.clone(),
            points: self.points[start..].to_vec(),
        }
    }

    /// Percent change against the value `periods` points earlier, e.g. 12 for
    /// year-over-year on a monthly series. The first `periods` points have no
    /// base and are dropped, as are points whose base is zero.
    pub fn pct_change(&self, periods: usize) -> Series {
        if periods == 0 {
            return self.clone();
        }
        let points = self
            .points
            .iter()
            .skip(periods)
            .zip(self.points.iter())
            .filter(|(_, base)| base.value != 0.0)
            .map(|(p, base)| MetricPoint {
                symbol: self.symbol.clone(),
                timestamp: p.timestamp,
                value: (p.value / base.value - 1.0) * 100.0,
            })
            .collect();
        Series {
            symbol: self.symbol.clone(),
            points,
        }
    }

    pub fn renamed(self, symbol: impl Into<String>) -> Series {
        let symbol = symbol.into();
        let points = self
            .points
            .into_iter()
            .map(|mut p| {
                p.symbol.clone_from(&symbol);
                p
            })
            .collect();
        Series { symbol, points }
    }
}
