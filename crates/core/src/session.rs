use crate::cache::MetricCache;
use crate::catalog::{default_catalog, MetricSpec};
use crate::config::Settings;
use crate::domain::Series;
use crate::error::DashboardError;
use crate::llm::anthropic::AnthropicClient;
use crate::llm::TextGenerator;
use crate::report::{build_prompt, ReportResult, ReportState, ReportTrigger};
use crate::source::{DataSource, FredCsvSource, RoutedSource, YahooChartSource};
use crate::view_model::{self, ViewModel};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricCard {
    Ready(ViewModel),
    Unavailable {
        id: String,
        label: String,
        error: DashboardError,
    },
}

impl MetricCard {
    pub fn id(&self) -> &str {
        match self {
            Self::Ready(vm) => &vm.id,
            Self::Unavailable { id, .. } => id,
        }
    }

    pub fn view_model(&self) -> Option<&ViewModel> {
        match self {
            Self::Ready(vm) => Some(vm),
            Self::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub cards: Vec<MetricCard>,
    pub generated_at: DateTime<Utc>,
}

impl Dashboard {
    pub fn ready(&self) -> impl Iterator<Item = &ViewModel> {
        self.cards.iter().filter_map(MetricCard::view_model)
    }

    pub fn unavailable_count(&self) -> usize {
        self.cards.len() - self.ready().count()
    }
}

pub struct DashboardSession {
    settings: Settings,
    cache: MetricCache,
    catalog: Vec<MetricSpec>,
    report: Option<ReportTrigger>,
    last_rendered: Mutex<Vec<ViewModel>>,
}

impl DashboardSession {
    pub fn new(
        settings: Settings,
        source: Arc<dyn DataSource>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let cache = MetricCache::new(source, settings.fetch_timeout)
            .with_stale_policy(settings.stale_policy);
        let report = generator.map(|g| ReportTrigger::new(g, settings.report_timeout));
        Self {
            settings,
            cache,
            catalog: default_catalog(),
            report,
            last_rendered: Mutex::new(Vec::new()),
        }
    }

    /// Production wiring: Yahoo for market tickers, FRED for `fred:` ids and the
    /// 10Y alias, Anthropic for reports when a key is configured.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let market = Arc::new(YahooChartSource::from_settings(&settings)?);
        let macro_source = Arc::new(FredCsvSource::from_settings(&settings)?);
        let source = Arc::new(RoutedSource::new(market, macro_source).with_default_aliases());

        let generator: Option<Arc<dyn TextGenerator>> = if settings.anthropic_api_key.is_some() {
            Some(Arc::new(AnthropicClient::from_settings(&settings)?))
        } else {
            tracing::warn!("ANTHROPIC_API_KEY not set; report generation disabled");
            None
        };

        Ok(Self::new(settings, source, generator))
    }

    pub fn with_catalog(mut self, catalog: Vec<MetricSpec>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &[MetricSpec] {
        &self.catalog
    }

    pub fn cache(&self) -> &MetricCache {
        &self.cache
    }

    /// Pulls every metric through the cache concurrently. Failures become
    /// `Unavailable` cards and never abort the other metrics.
    pub async fn render(&self) -> Dashboard {
        self.collect(false).await
    }

    pub async fn refresh(&self) -> Dashboard {
        self.collect(true).await
    }

    async fn collect(&self, force: bool) -> Dashboard {
        let cards =
            futures::future::join_all(self.catalog.iter().map(|m| self.card(m, force))).await;
        let dashboard = Dashboard {
            cards,
            generated_at: Utc::now(),
        };

        tracing::info!(
            cards = dashboard.cards.len(),
            unavailable = dashboard.unavailable_count(),
            force,
            "dashboard rendered"
        );

        *self
            .last_rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = dashboard.ready().cloned().collect();
        dashboard
    }

    async fn card(&self, metric: &MetricSpec, force: bool) -> MetricCard {
        let ttl = metric.cadence.ttl(&self.settings);
        let fetched = if force {
            self.cache.refresh(&metric.symbol, metric.range, ttl).await
        } else {
            self.cache.get_or_fetch(&metric.symbol, metric.range, ttl).await
        };

        match fetched {
            Ok(cached) => {
                let series = metric.transform.apply(&cached.series);
                let previous = Series::empty(series.symbol());
                MetricCard::Ready(
                    view_model::build(&series, &previous, &metric.display)
                        .with_stale(cached.stale),
                )
            }
            Err(error) => {
                tracing::warn!(id = metric.id(), symbol = %metric.symbol, %error, "metric unavailable");
                MetricCard::Unavailable {
                    id: metric.id().to_string(),
                    label: metric.label().to_string(),
                    error,
                }
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("metric cache cleared");
    }

    pub fn last_rendered(&self) -> Vec<ViewModel> {
        self.last_rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn prompt(&self, as_of: NaiveDate) -> String {
        build_prompt(&self.last_rendered(), as_of)
    }

    pub fn report_enabled(&self) -> bool {
        self.report.is_some()
    }

    pub fn trigger_report(&self, as_of: NaiveDate) -> Result<Uuid, DashboardError> {
        let trigger = self.trigger()?;
        Ok(trigger.trigger(&self.last_rendered(), as_of))
    }

    pub async fn generate_report(&self, as_of: NaiveDate) -> ReportResult {
        match self.trigger() {
            Ok(trigger) => trigger.generate(&self.last_rendered(), as_of).await,
            Err(err) => ReportResult::Failure {
                reason: err.to_string(),
            },
        }
    }

    pub fn report_state(&self) -> ReportState {
        self.report
            .as_ref()
            .map_or(ReportState::Idle, ReportTrigger::state)
    }

    pub fn cancel_report(&self) {
        if let Some(trigger) = &self.report {
            trigger.cancel();
        }
    }

    fn trigger(&self) -> Result<&ReportTrigger, DashboardError> {
        self.report
            .as_ref()
            .ok_or_else(|| DashboardError::report_failed("no text generator configured"))
    }
}
