//! Drift detection domain models.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::autofix::AutoFixOutcome;

// =============================================================================
// Event type and severity
// =============================================================================

/// Likely cause of a stored price drifting from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    StockSplit,
    ReverseSplit,
    Dividend,
    SpecialDividend,
    CapitalGain,
    Spinoff,
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StockSplit => "STOCK_SPLIT",
            EventType::ReverseSplit => "REVERSE_SPLIT",
            EventType::Dividend => "DIVIDEND",
            EventType::SpecialDividend => "SPECIAL_DIVIDEND",
            EventType::CapitalGain => "CAPITAL_GAIN",
            EventType::Spinoff => "SPINOFF",
            EventType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered from lowest to highest: Low < Normal < High < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Normal,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Normal => "NORMAL",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Events and results
// =============================================================================

/// One significant difference between a stored and a reference price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentEvent {
    pub symbol: String,
    pub event_type: EventType,
    pub severity: Severity,
    /// `|stored - reference| / stored * 100`, 6 decimal places
    pub pct_difference: Decimal,
    pub check_date: NaiveDate,
    pub stored_price: Decimal,
    pub reference_price: Decimal,
    /// Evidence behind the classification (ratios, counts, amounts)
    pub details: BTreeMap<String, Value>,
    pub recommendation: String,
}

/// Drift scan outcome for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub symbol: String,
    pub needs_refresh: bool,
    /// Ascending by check date
    pub events: Vec<AdjustmentEvent>,
    pub max_pct_diff: Decimal,
    /// Dates compared against the source
    pub dates_checked: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    pub fn failed(symbol: &str, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn from_events(symbol: &str, events: Vec<AdjustmentEvent>, dates_checked: usize) -> Self {
        let max_pct_diff = events
            .iter()
            .map(|e| e.pct_difference)
            .max()
            .unwrap_or(Decimal::ZERO);
        Self {
            symbol: symbol.to_string(),
            needs_refresh: !events.is_empty(),
            events,
            max_pct_diff,
            dates_checked,
            error: None,
        }
    }

    /// Highest severity among the events, if any.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.events.iter().map(|e| e.severity).max()
    }
}

/// Aggregate of a multi-symbol scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub symbols_scanned: usize,
    pub symbols_needing_refresh: usize,
    pub symbols_failed: usize,
    pub events_by_type: BTreeMap<EventType, usize>,
    pub events_by_severity: BTreeMap<Severity, usize>,
    pub results: Vec<ScanResult>,
    pub auto_fixes: Vec<AutoFixOutcome>,
}

impl ScanReport {
    pub fn record(&mut self, result: ScanResult) {
        self.symbols_scanned += 1;
        if result.needs_refresh {
            self.symbols_needing_refresh += 1;
        }
        if result.error.is_some() {
            self.symbols_failed += 1;
        }
        for event in &result.events {
            *self.events_by_type.entry(event.event_type).or_default() += 1;
            *self.events_by_severity.entry(event.severity).or_default() += 1;
        }
        self.results.push(result);
    }
}
