//! Corporate action heuristics.
//!
//! Only actions strictly after the sampled date can have changed it. Rules
//! are tried in order and the first match wins:
//!
//! 1. split-sized difference with a split after the date
//! 2. spinoff-sized difference with no split after the date
//! 3. dividends after the date (special when one dwarfs the recent mean)
//! 4. capital gain distributions after the date
//! 5. nothing recognisable

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::model::{EventType, Severity};
use crate::config::DriftThresholds;
use crate::constants::{DIVIDEND_HISTORY_LEN, SPECIAL_DIVIDEND_MULTIPLE};
use pricesync_market_data::CorporateActions;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub event_type: EventType,
    pub severity: Severity,
    pub details: BTreeMap<String, Value>,
    pub recommendation: String,
}

impl Classification {
    fn new(event_type: EventType, severity: Severity, recommendation: &str) -> Self {
        Self {
            event_type,
            severity,
            details: BTreeMap::new(),
            recommendation: recommendation.to_string(),
        }
    }

    fn detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

pub fn classify(
    pct: Decimal,
    check_date: NaiveDate,
    actions: &CorporateActions,
    thresholds: &DriftThresholds,
) -> Classification {
    let split_count = actions.splits_after(check_date).count();

    if pct >= thresholds.split_pct {
        if let Some(ratio) = actions.cumulative_split_ratio_after(check_date) {
            let (event_type, severity) = if ratio >= Decimal::ONE {
                (EventType::StockSplit, Severity::Critical)
            } else {
                (EventType::ReverseSplit, Severity::High)
            };
            let dates: Vec<String> = actions
                .splits_after(check_date)
                .map(|s| s.date.to_string())
                .collect();
            return Classification::new(
                event_type,
                severity,
                "Refetch full history so split-adjusted prices replace stored ones",
            )
            .detail("cumulativeRatio", json!(ratio.normalize().to_string()))
            .detail("splitCount", json!(split_count))
            .detail("splitDates", json!(dates));
        }
    }

    if pct >= thresholds.spinoff_pct && split_count == 0 {
        return Classification::new(
            EventType::Spinoff,
            Severity::Critical,
            "Large unexplained adjustment, likely a spinoff; refetch full history",
        );
    }

    let dividends: Vec<Decimal> = actions
        .dividends_after(check_date)
        .map(|d| d.amount)
        .collect();
    if !dividends.is_empty() {
        let largest = dividends.iter().copied().max().unwrap_or(Decimal::ZERO);
        let total: Decimal = dividends.iter().copied().sum();
        let special = pct >= thresholds.special_dividend_pct && is_special(largest, actions);

        let classification = if special {
            Classification::new(
                EventType::SpecialDividend,
                Severity::High,
                "Special dividend changed adjusted history; refetch full history",
            )
        } else {
            Classification::new(
                EventType::Dividend,
                Severity::Normal,
                "Dividend adjustment; refetch to keep adjusted prices consistent",
            )
        };
        return classification
            .detail("dividendCount", json!(dividends.len()))
            .detail("dividendTotal", json!(total.normalize().to_string()))
            .detail("largestDividend", json!(largest.normalize().to_string()));
    }

    let distributions = actions.distributions_after(check_date).count();
    if distributions > 0 {
        return Classification::new(
            EventType::CapitalGain,
            Severity::Normal,
            "Capital gain distribution adjustment; refetch affected range",
        )
        .detail("distributionCount", json!(distributions));
    }

    Classification::new(
        EventType::Unknown,
        Severity::Low,
        "Unexplained difference; review the symbol before refetching",
    )
}

/// True when `largest` exceeds twice the mean of the recent dividends.
fn is_special(largest: Decimal, actions: &CorporateActions) -> bool {
    let recent = actions.recent_dividends(DIVIDEND_HISTORY_LEN);
    if recent.is_empty() {
        return false;
    }
    let mean = recent.iter().map(|d| d.amount).sum::<Decimal>() / Decimal::from(recent.len());
    largest > mean * Decimal::from(SPECIAL_DIVIDEND_MULTIPLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricesync_market_data::{Distribution, Dividend, Split};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn split(on: NaiveDate, numerator: Decimal, denominator: Decimal) -> Split {
        Split {
            date: on,
            numerator,
            denominator,
        }
    }

    fn dividend(on: NaiveDate, amount: Decimal) -> Dividend {
        Dividend { date: on, amount }
    }

    fn thresholds() -> DriftThresholds {
        DriftThresholds::default()
    }

    #[test]
    fn test_forward_split() {
        let actions = CorporateActions {
            splits: vec![split(date(2024, 1, 3), dec!(4), dec!(1))],
            ..Default::default()
        };
        let c = classify(dec!(75), date(2024, 1, 2), &actions, &thresholds());
        assert_eq!(c.event_type, EventType::StockSplit);
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.details.get("cumulativeRatio"), Some(&json!("4")));
    }

    #[test]
    fn test_reverse_split() {
        let actions = CorporateActions {
            splits: vec![split(date(2024, 1, 3), dec!(1), dec!(10))],
            ..Default::default()
        };
        let c = classify(dec!(900), date(2024, 1, 2), &actions, &thresholds());
        assert_eq!(c.event_type, EventType::ReverseSplit);
        assert_eq!(c.severity, Severity::High);
    }

    #[test]
    fn test_split_on_or_before_date_is_ignored() {
        let actions = CorporateActions {
            splits: vec![split(date(2024, 1, 2), dec!(4), dec!(1))],
            ..Default::default()
        };
        let c = classify(dec!(75), date(2024, 1, 2), &actions, &thresholds());
        // Large and unexplained by any later split
        assert_eq!(c.event_type, EventType::Spinoff);
        assert_eq!(c.severity, Severity::Critical);
    }

    #[test]
    fn test_regular_and_special_dividends() {
        let mut dividends: Vec<Dividend> = (1..=6)
            .map(|m| dividend(date(2023, m, 15), dec!(0.25)))
            .collect();
        let actions = CorporateActions {
            dividends: dividends.clone(),
            ..Default::default()
        };
        let c = classify(dec!(1.2), date(2023, 1, 1), &actions, &thresholds());
        assert_eq!(c.event_type, EventType::Dividend);
        assert_eq!(c.severity, Severity::Normal);
        assert_eq!(c.details.get("dividendCount"), Some(&json!(6)));

        dividends.push(dividend(date(2023, 7, 15), dec!(5)));
        let actions = CorporateActions {
            dividends,
            ..Default::default()
        };
        let c = classify(dec!(8), date(2023, 1, 1), &actions, &thresholds());
        assert_eq!(c.event_type, EventType::SpecialDividend);
        assert_eq!(c.severity, Severity::High);

        // Same payout but a small difference stays a regular dividend
        let c = classify(dec!(1), date(2023, 1, 1), &actions, &thresholds());
        assert_eq!(c.event_type, EventType::Dividend);
    }

    #[test]
    fn test_capital_gain_and_unknown() {
        let actions = CorporateActions {
            distributions: vec![Distribution {
                date: date(2024, 6, 1),
                amount: dec!(1.1),
            }],
            ..Default::default()
        };
        let c = classify(dec!(2), date(2024, 1, 1), &actions, &thresholds());
        assert_eq!(c.event_type, EventType::CapitalGain);
        assert_eq!(c.severity, Severity::Normal);

        let c = classify(dec!(2), date(2024, 1, 1), &CorporateActions::default(), &thresholds());
        assert_eq!(c.event_type, EventType::Unknown);
        assert_eq!(c.severity, Severity::Low);
    }
}
