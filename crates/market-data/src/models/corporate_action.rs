//! Corporate action series.
//!
//! Each series is keyed by the date the action took effect. The drift
//! detector only cares about actions that happened strictly after a sampled
//! price, since those are the ones that retroactively changed it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stock split. A 4-for-1 split has numerator 4 and denominator 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub date: NaiveDate,
    pub numerator: Decimal,
    pub denominator: Decimal,
}

impl Split {
    /// Shares received per share held, or None for a malformed split.
    pub fn ratio(&self) -> Option<Decimal> {
        if self.denominator.is_zero() || self.numerator.is_zero() {
            None
        } else {
            Some(self.numerator / self.denominator)
        }
    }
}

/// A cash dividend per share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// A capital gain distribution per share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// All corporate actions reported for one symbol over a window.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorporateActions {
    pub splits: Vec<Split>,
    pub dividends: Vec<Dividend>,
    pub distributions: Vec<Distribution>,
}

impl CorporateActions {
    /// Sort every series by date ascending.
    pub fn sorted(mut self) -> Self {
        self.splits.sort_by_key(|s| s.date);
        self.dividends.sort_by_key(|d| d.date);
        self.distributions.sort_by_key(|d| d.date);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty() && self.dividends.is_empty() && self.distributions.is_empty()
    }

    /// Splits that took effect strictly after `date`.
    pub fn splits_after(&self, date: NaiveDate) -> impl Iterator<Item = &Split> {
        self.splits.iter().filter(move |s| s.date > date)
    }

    /// Dividends paid strictly after `date`.
    pub fn dividends_after(&self, date: NaiveDate) -> impl Iterator<Item = &Dividend> {
        self.dividends.iter().filter(move |d| d.date > date)
    }

    /// Distributions paid strictly after `date`.
    pub fn distributions_after(&self, date: NaiveDate) -> impl Iterator<Item = &Distribution> {
        self.distributions.iter().filter(move |d| d.date > date)
    }

    /// Product of all split ratios after `date`.
    ///
    /// Returns None when no usable split exists after the date.
    pub fn cumulative_split_ratio_after(&self, date: NaiveDate) -> Option<Decimal> {
        self.splits_after(date)
            .filter_map(Split::ratio)
            .fold(None, |acc, ratio| Some(acc.unwrap_or(Decimal::ONE) * ratio))
    }

    /// The `count` most recent dividends, newest last.
    pub fn recent_dividends(&self, count: usize) -> &[Dividend] {
        let start = self.dividends.len().saturating_sub(count);
        &self.dividends[start..]
    }
}
