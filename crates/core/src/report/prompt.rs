use crate::view_model::ViewModel;
use chrono::NaiveDate;
use std::fmt::Write;

const REQUESTS: [&str; 4] = [
    "Market mood in three lines: state clearly whether the market is in greed, fear, or wait-and-see mode.",
    "Key indicators: explain how the moves in Treasury yields and the dollar/won exchange rate are pressuring the stock market (S&P 500).",
    "Risk check: from the inflation and unemployment trends, forecast the likely direction of Fed policy.",
    "Investment advice: across stocks, bonds and commodities, should an individual investor raise cash now or keep buying?",
];

pub fn summary_line(vm: &ViewModel) -> String {
    let mut line = format!("- {}: {}", vm.label, vm.current_value);
    if vm.delta_value != crate::view_model::MISSING {
        let _ = write!(line, " (change vs previous: {})", vm.delta_value);
    }
    if let Some(note) = &vm.note {
        let _ = write!(line, " [expected move: {note}]");
    }
    if vm.stale {
        line.push_str(" [stale data]");
    }
    line
}

/// Builds the commentary prompt. Cards are ordered by label (ties by id), so the
/// same cards always give the same prompt regardless of fetch completion order.
pub fn build_prompt(context: &[ViewModel], as_of: NaiveDate) -> String {
    let mut cards: Vec<&ViewModel> = context.iter().collect();
    cards.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));

    let mut out = String::new();
    out.push_str("[Role]\n");
    out.push_str(
        "You are a macroeconomic analyst with 20 years of experience on Wall Street, \
         and my friendly investment mentor.\n\n",
    );
    out.push_str("[Situation]\n");
    let _ = writeln!(
        out,
        "Today is {}. The latest collected market data is below.\n",
        as_of.format("%Y-%m-%d")
    );
    out.push_str("[Data report]\n");
    if cards.is_empty() {
        out.push_str("- (no data available)\n");
    }
    for vm in cards {
        out.push_str(&summary_line(vm));
        out.push('\n');
    }
    out.push_str("\n[Requests]\n");
    for (i, request) in REQUESTS.iter().enumerate() {
        let _ = writeln!(out, "{}. {request}", i + 1);
    }
    out.push_str("\nUse professional terminology, but explain it so it is easy to understand, in a polite tone.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Series;
    use crate::view_model::{DeltaSign, ViewModel};

    fn card(id: &str, label: &str, current: &str, delta: &str) -> ViewModel {
        ViewModel {
            id: id.to_string(),
            label: label.to_string(),
            current_value: current.to_string(),
            delta_value: delta.to_string(),
            delta_sign: DeltaSign::Flat,
            chart_series: Series::empty(id),
            chart_bounds: None,
            note: None,
            stale: false,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn orders_cards_by_label() {
        let a = vec![
            card("vix", "VIX", "16.20", "+0.40"),
            card("spx", "S&P 500", "6,001.10", "-12.30"),
        ];
        let b: Vec<ViewModel> = a.iter().rev().cloned().collect();

        let prompt = build_prompt(&a, date());
        assert_eq!(prompt, build_prompt(&b, date()));

        let spx = prompt.find("- S&P 500: 6,001.10 (change vs previous: -12.30)").unwrap();
        let vix = prompt.find("- VIX: 16.20").unwrap();
        assert!(spx < vix);
        assert!(prompt.contains("Today is 2026-10-19."));
    }

    #[test]
    fn summary_line_marks_notes_missing_delta_and_staleness() {
        let mut vm = card("vix", "VIX", "16.00", "—");
        vm.note = Some("VIX/16 ±1.00%".to_string());
        vm.stale = true;
        assert_eq!(
            summary_line(&vm),
            "- VIX: 16.00 [expected move: VIX/16 ±1.00%] [stale data]"
        );
    }

    #[test]
    fn empty_context_still_renders_requests() {
        let prompt = build_prompt(&[], date());
        assert!(prompt.contains("(no data available)"));
        assert!(prompt.contains("4. Investment advice"));
    }
}
