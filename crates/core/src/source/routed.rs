use crate::domain::{Range, Series};
use crate::error::DashboardError;
use crate::source::fred::FRED_PREFIX;
use crate::source::DataSource;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Market(String),
    Macro(String),
}

/// Sends market tickers to the market source and `fred:` ids (plus configured
/// aliases) to the macro source. The returned series keeps the requested symbol.
pub struct RoutedSource {
    market: Arc<dyn DataSource>,
    macro_source: Arc<dyn DataSource>,
    aliases: BTreeMap<String, Route>,
}

impl RoutedSource {
    pub fn new(market: Arc<dyn DataSource>, macro_source: Arc<dyn DataSource>) -> Self {
        Self {
            market,
            macro_source,
            aliases: BTreeMap::new(),
        }
    }

    /// `^TNX` is read from FRED's DGS10.
    pub fn with_default_aliases(self) -> Self {
        self.with_alias("^TNX", Route::Macro("DGS10".to_string()))
    }

    pub fn with_alias(mut self, symbol: impl Into<String>, route: Route) -> Self {
        self.aliases.insert(symbol.into(), route);
        self
    }

    pub fn route(&self, symbol: &str) -> Route {
        if let Some(route) = self.aliases.get(symbol) {
            return route.clone();
        }
        match symbol.strip_prefix(FRED_PREFIX) {
            Some(id) => Route::Macro(id.to_string()),
            None => Route::Market(symbol.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for RoutedSource {
    fn source_name(&self) -> &'static str {
        "routed"
    }

    async fn fetch(&self, symbol: &str, range: Range) -> Result<Series, DashboardError> {
        let (source, target) = match self.route(symbol) {
            Route::Market(target) => (&self.market, target),
            Route::Macro(target) => (&self.macro_source, target),
        };
        if target != symbol {
            tracing::debug!(symbol, %target, source = source.source_name(), "routing aliased symbol");
        }

        match source.fetch(&target, range).await {
            Ok(series) => Ok(series.renamed(symbol)),
            Err(DashboardError::InvalidSymbol { .. }) => Err(DashboardError::InvalidSymbol {
                symbol: symbol.to_string(),
            }),
            Err(err) => Err(err),
        }
    }
}
