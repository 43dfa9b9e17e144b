use crate::domain::Series;
use serde::{Deserialize, Serialize};

pub const MISSING: &str = "—";

const DEFAULT_MAX_DECIMALS: usize = 2;
const PERCENT_DECIMALS: usize = 2;
const CHART_PADDING_RATIO: f64 = 0.1;
const FLAT_CHART_PADDING: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaSign {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaMode {
    #[default]
    Absolute,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteRule {
    /// Volatility index read as an expected daily move, e.g. VIX/16.
    ImpliedDailyMove { divisor: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySpec {
    pub id: String,
    pub label: String,
    /// Fixed number of decimals; `None` prints the shortest form up to two decimals.
    pub decimals: Option<usize>,
    pub thousands_separator: bool,
    pub suffix: String,
    pub delta_mode: DeltaMode,
    pub note: Option<NoteRule>,
    pub chart_points: Option<usize>,
    pub target: Option<f64>,
}

impl DisplaySpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            decimals: None,
            thousands_separator: true,
            suffix: String::new(),
            delta_mode: DeltaMode::Absolute,
            note: None,
            chart_points: None,
            target: None,
        }
    }

    pub fn decimals(mut self, decimals: usize) -> Self {
        self.decimals = Some(decimals);
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn delta_mode(mut self, mode: DeltaMode) -> Self {
        self.delta_mode = mode;
        self
    }

    pub fn note(mut self, note: NoteRule) -> Self {
        self.note = Some(note);
        self
    }

    pub fn chart_points(mut self, n: usize) -> Self {
        self.chart_points = Some(n);
        self
    }

    pub fn target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartBounds {
    pub min: f64,
    pub max: f64,
    pub target: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub id: String,
    pub label: String,
    pub current_value: String,
    pub delta_value: String,
    pub delta_sign: DeltaSign,
    pub chart_series: Series,
    pub chart_bounds: Option<ChartBounds>,
    pub note: Option<String>,
    pub stale: bool,
}

impl ViewModel {
    pub fn with_stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }
}

/// The current value is the last point of `series`. The previous value is the
/// last point of `previous`, or the second-to-last point of `series` when
/// `previous` is empty. Without a previous value the delta is flat and shown as
/// [`MISSING`].
pub fn build(series: &Series, previous: &Series, spec: &DisplaySpec) -> ViewModel {
    let current = series.last().map(|p| p.value);
    let previous_value = previous
        .last()
        .or_else(|| series.points().iter().rev().nth(1))
        .map(|p| p.value);

    let current_value = match current {
        Some(v) => {
            let shown = round_to(v, spec.precision());
            format!("{}{}", signed_negative(shown, format_number(shown, spec)), spec.suffix)
        }
        None => MISSING.to_string(),
    };

    let (delta_value, delta_sign) = match (current, previous_value) {
        (Some(cur), Some(prev)) => format_delta(cur, prev, spec),
        _ => (MISSING.to_string(), DeltaSign::Flat),
    };

    let note = match (spec.note, current) {
        (Some(NoteRule::ImpliedDailyMove { divisor }), Some(cur)) if divisor != 0.0 => {
            Some(format!("{}/{divisor} ±{:.2}%", spec.label_short(), cur / divisor))
        }
        _ => None,
    };

    let chart_series = match spec.chart_points {
        Some(n) => series.tail(n),
        None => series.clone(),
    };
    let chart_bounds = chart_bounds(&chart_series, spec.target);

    ViewModel {
        id: spec.id.clone(),
        label: spec.label.clone(),
        current_value,
        delta_value,
        delta_sign,
        chart_series,
        chart_bounds,
        note,
        stale: false,
    }
}

impl DisplaySpec {
    fn label_short(&self) -> &str {
        self.label.split_whitespace().next().unwrap_or(&self.label)
    }

    fn precision(&self) -> usize {
        self.decimals.unwrap_or(DEFAULT_MAX_DECIMALS)
    }
}

fn format_delta(current: f64, previous: f64, spec: &DisplaySpec) -> (String, DeltaSign) {
    let delta = current - previous;

    // Sign and arrow follow the rounded figure that is actually printed.
    let (shown, text) = match spec.delta_mode {
        DeltaMode::Absolute => {
            let d = round_to(delta, spec.precision());
            (d, signed(d, format_number(d, spec)))
        }
        DeltaMode::Percent if previous != 0.0 => {
            let pct = round_to(delta / previous.abs() * 100.0, PERCENT_DECIMALS);
            let text = format!("{}%", signed(pct, format_fixed(pct, PERCENT_DECIMALS, false)));
            (pct, text)
        }
        DeltaMode::Percent => (round_to(delta, spec.precision()), MISSING.to_string()),
    };

    let sign = if shown > 0.0 {
        DeltaSign::Up
    } else if shown < 0.0 {
        DeltaSign::Down
    } else {
        DeltaSign::Flat
    };
    (text, sign)
}

fn signed(value: f64, magnitude: String) -> String {
    if value > 0.0 {
        format!("+{magnitude}")
    } else if value < 0.0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

fn signed_negative(value: f64, magnitude: String) -> String {
    if value < 0.0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn format_number(value: f64, spec: &DisplaySpec) -> String {
    match spec.decimals {
        Some(d) => format_fixed(value, d, spec.thousands_separator),
        None => {
            let fixed = format_fixed(value, DEFAULT_MAX_DECIMALS, spec.thousands_separator);
            if fixed.contains('.') {
                fixed.trim_end_matches('0').trim_end_matches('.').to_string()
            } else {
                fixed
            }
        }
    }
}

fn format_fixed(value: f64, decimals: usize, thousands: bool) -> String {
    let raw = format!("{:.*}", decimals, value.abs());
    if !thousands {
        return raw;
    }
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };

    let mut grouped = String::with_capacity(raw.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac_part {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}

/// Value range of the chart padded by 10% (or a small constant when flat),
/// widened to include `target`.
pub fn chart_bounds(series: &Series, target: Option<f64>) -> Option<ChartBounds> {
    let mut values = series.values().chain(target);
    let first = values.next()?;
    let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));

    let span = max - min;
    let padding = if span != 0.0 {
        span * CHART_PADDING_RATIO
    } else {
        FLAT_CHART_PADDING
    };
    Some(ChartBounds {
        min: min - padding,
        max: max + padding,
        target,
    })
}
