use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::DriftThresholds;
use crate::constants::PCT_DECIMAL_PRECISION;

/// Relative difference of `reference` from `stored`, in percent.
///
/// A zero on either side is not comparable and scores 0.
pub fn pct_difference(stored: Decimal, reference: Decimal) -> Decimal {
    if stored.is_zero() || reference.is_zero() {
        return Decimal::ZERO;
    }
    ((stored - reference).abs() / stored.abs() * dec!(100)).round_dp(PCT_DECIMAL_PRECISION)
}

/// Above the noise floor and at least the minimum detection threshold.
pub fn is_significant(pct: Decimal, thresholds: &DriftThresholds) -> bool {
    pct > thresholds.noise_floor_pct && pct >= thresholds.min_detection_pct
}
