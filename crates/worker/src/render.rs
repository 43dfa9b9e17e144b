use radar_core::session::{Dashboard, MetricCard};
use radar_core::view_model::{DeltaSign, ViewModel};
use std::fmt::Write;

const LABEL_WIDTH: usize = 28;

pub fn render_text(dashboard: &Dashboard) -> String {
    let mut out = format!(
        "Market radar ({})\n",
        dashboard.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    for card in &dashboard.cards {
        match card {
            MetricCard::Ready(vm) => push_ready(&mut out, vm),
            MetricCard::Unavailable { label, error, .. } => {
                let _ = writeln!(out, "{label:<LABEL_WIDTH$} unavailable: {error}");
            }
        }
    }
    out
}

fn push_ready(out: &mut String, vm: &ViewModel) {
    let arrow = match vm.delta_sign {
        DeltaSign::Up => '▲',
        DeltaSign::Down => '▼',
        DeltaSign::Flat => ' ',
    };
    let _ = write!(
        out,
        "{:<LABEL_WIDTH$} {:>16} {:>12} {arrow}",
        vm.label, vm.current_value, vm.delta_value
    );
    if vm.stale {
        out.push_str(" (stale)");
    }
    out.push('\n');
    if let Some(note) = &vm.note {
        let _ = writeln!(out, "{:LABEL_WIDTH$}   {note}", "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use radar_core::domain::Series;
    use radar_core::error::DashboardError;

    fn vm(label: &str, current: &str, delta: &str, sign: DeltaSign) -> ViewModel {
        ViewModel {
            id: label.to_lowercase(),
            label: label.to_string(),
            current_value: current.to_string(),
            delta_value: delta.to_string(),
            delta_sign: sign,
            chart_series: Series::empty(label),
            chart_bounds: None,
            note: None,
            stale: false,
        }
    }

    #[test]
    fn renders_ready_and_unavailable_cards() {
        let mut vix = vm("VIX", "16.00", "-0.50", DeltaSign::Down);
        vix.note = Some("VIX/16 ±1.00%".to_string());
        vix.stale = true;

        let dashboard = Dashboard {
            cards: vec![
                MetricCard::Ready(vm("KOSPI", "2,600.00", "+12.00", DeltaSign::Up)),
                MetricCard::Ready(vix),
                MetricCard::Unavailable {
                    id: "unrate".to_string(),
                    label: "US Unemployment Rate".to_string(),
                    error: DashboardError::RateLimited {
                        source_name: "fred",
                    },
                },
            ],
            generated_at: Utc.with_ymd_and_hms(2026, 10, 19, 0, 30, 0).unwrap(),
        };

        let text = render_text(&dashboard);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Market radar (2026-10-19 00:30 UTC)");
        assert!(lines[1].starts_with("KOSPI "));
        assert!(lines[1].ends_with("+12.00 ▲"));
        assert!(lines[2].ends_with("▼ (stale)"));
        assert_eq!(lines[3].trim(), "VIX/16 ±1.00%");
        assert!(lines[4].ends_with("unavailable: rate limited by fred"));
    }
}
