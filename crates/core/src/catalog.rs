use crate::config::Settings;
use crate::domain::{Range, Series};
use crate::view_model::{DisplaySpec, NoteRule};
use std::time::Duration;

const DAILY_CHART_POINTS: usize = 90;
const MACRO_CHART_POINTS: usize = 60;
const VIX_DIVISOR: f64 = 16.0;
const CPI_TARGET: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    Macro,
}

impl Cadence {
    pub fn ttl(self, settings: &Settings) -> Duration {
        match self {
            Self::Daily => settings.daily_ttl,
            Self::Macro => settings.macro_ttl,
        }
    }
}

/// Post-processing applied to a fetched series before it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    #[default]
    None,
    /// Percent change against the value `periods` observations earlier.
    YearOverYear { periods: usize },
}

impl Transform {
    pub fn apply(self, series: &Series) -> Series {
        match self {
            Self::None => series.clone(),
            Self::YearOverYear { periods } => series.pct_change(periods),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSpec {
    pub symbol: String,
    pub range: Range,
    pub cadence: Cadence,
    pub transform: Transform,
    pub display: DisplaySpec,
}

impl MetricSpec {
    fn daily(symbol: &str, display: DisplaySpec) -> Self {
        Self {
            symbol: symbol.to_string(),
            range: Range::SixMonths,
            cadence: Cadence::Daily,
            transform: Transform::None,
            display: display.chart_points(DAILY_CHART_POINTS),
        }
    }

    fn macro_series(symbol: &str, display: DisplaySpec) -> Self {
        Self {
            symbol: symbol.to_string(),
            range: Range::Max,
            cadence: Cadence::Macro,
            transform: Transform::None,
            display: display.chart_points(MACRO_CHART_POINTS),
        }
    }

    fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn id(&self) -> &str {
        &self.display.id
    }

    pub fn label(&self) -> &str {
        &self.display.label
    }
}

/// The indicator set shown on the dashboard, in display order.
pub fn default_catalog() -> Vec<MetricSpec> {
    vec![
        MetricSpec::daily(
            "^TNX",
            DisplaySpec::new("us10y", "US 10Y Treasury Yield")
                .decimals(2)
                .suffix("%"),
        ),
        MetricSpec::daily(
            "KRW=X",
            DisplaySpec::new("usdkrw", "USD/KRW").decimals(2).suffix(" KRW"),
        ),
        MetricSpec::daily(
            "^VIX",
            DisplaySpec::new("vix", "VIX Volatility Index")
                .decimals(2)
                .note(NoteRule::ImpliedDailyMove {
                    divisor: VIX_DIVISOR,
                }),
        ),
        MetricSpec::daily(
            "^IXIC",
            DisplaySpec::new("nasdaq", "Nasdaq Composite").decimals(2),
        ),
        MetricSpec::daily("^GSPC", DisplaySpec::new("sp500", "S&P 500").decimals(2)),
        MetricSpec::daily("^N225", DisplaySpec::new("nikkei", "Nikkei 225").decimals(2)),
        MetricSpec::daily(
            "EEM",
            DisplaySpec::new("eem", "Emerging Markets ETF (EEM)").decimals(2),
        ),
        MetricSpec::daily("^KS11", DisplaySpec::new("kospi", "KOSPI").decimals(2)),
        MetricSpec::macro_series(
            "fred:CPIAUCSL",
            DisplaySpec::new("cpi_yoy", "US CPI YoY")
                .decimals(2)
                .suffix("%")
                .target(CPI_TARGET),
        )
        .transform(Transform::YearOverYear { periods: 12 }),
        MetricSpec::macro_series(
            "fred:UNRATE",
            DisplaySpec::new("unrate", "US Unemployment Rate")
                .decimals(1)
                .suffix("%"),
        ),
    ]
}

/// Keeps the metrics whose id appears in `ids`; an empty filter keeps everything.
pub fn filter_catalog(catalog: Vec<MetricSpec>, ids: &[String]) -> Vec<MetricSpec> {
    if ids.is_empty() {
        return catalog;
    }
    catalog
        .into_iter()
        .filter(|m| ids.iter().any(|id| id.eq_ignore_ascii_case(m.id())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let catalog = default_catalog();
        let ids: HashSet<&str> = catalog.iter().map(|m| m.id()).collect();
        assert_eq!(ids.len(), catalog.len());
        assert_eq!(catalog.len(), 10);
    }

    #[test]
    fn macro_metrics_use_macro_ttl() {
        let settings = Settings::default();
        let catalog = default_catalog();
        let cpi = catalog.iter().find(|m| m.id() == "cpi_yoy").unwrap();
        assert_eq!(cpi.cadence.ttl(&settings), Duration::from_secs(86_400));
        assert_eq!(cpi.range, Range::Max);
        assert_eq!(cpi.transform, Transform::YearOverYear { periods: 12 });
        assert_eq!(cpi.display.target, Some(2.0));

        let vix = catalog.iter().find(|m| m.symbol == "^VIX").unwrap();
        assert_eq!(vix.cadence.ttl(&settings), Duration::from_secs(3600));
        assert_eq!(vix.display.chart_points, Some(90));
    }

    #[test]
    fn year_over_year_transform() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let series = Series::from_values(
            "fred:CPIAUCSL",
            (0..13).map(|i| (start + chrono::Duration::days(31 * i), 100.0 + i as f64 * 0.25)),
        );
        let yoy = Transform::YearOverYear { periods: 12 }.apply(&series);
        assert_eq!(yoy.len(), 1);
        assert!((yoy.last().unwrap().value - 3.0).abs() < 1e-9);
    }

    #[test]
    fn filter_is_case_insensitive_and_empty_keeps_all() {
        let all = filter_catalog(default_catalog(), &[]);
        assert_eq!(all.len(), 10);

        let some = filter_catalog(default_catalog(), &["VIX".to_string(), "sp500".to_string()]);
        let ids: Vec<&str> = some.iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec!["vix", "sp500"]);
    }
}
