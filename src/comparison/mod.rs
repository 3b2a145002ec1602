//! Direct vs. cross conversion of a TWD budget.
//!
//! Direct: budget × kiosk TWD rate. Cross: budget → USD cash at the bank's
//! sell rate (whole notes only), then USD → target at the kiosk USD rate.
//! Every total is floored to a whole unit.

use serde::{Deserialize, Serialize};
use crate::config::ComparisonConfig;
use crate::types::snapshot::RateSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversionPath {
    Direct,
    Cross,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub path_direct_total: i64,
    pub usd_obtained: i64,
    pub path_cross_total: i64,
    pub absolute_difference: i64,
    pub recommended_path: ConversionPath,
}

/// Replace NaN, infinities and zero with `default`.
fn or_default(value: f64, default: f64) -> f64 {
    if value.is_finite() && value != 0.0 { value } else { default }
}

fn floor_to_i64(value: f64) -> i64 {
    let floored = value.floor();
    if floored.is_finite() { floored as i64 } else { 0 }
}

pub fn compare(
    budget: f64,
    bank_sell_usd: f64,
    kiosk_twd_rate: f64,
    kiosk_usd_rate: f64,
    defaults: &ComparisonConfig,
) -> ComparisonResult {
    let budget = if budget.is_finite() { budget.max(0.0) } else { 0.0 };
    let kiosk_twd_rate = or_default(kiosk_twd_rate, 0.0).max(0.0);
    let bank_sell_usd = or_default(bank_sell_usd, defaults.default_bank_sell_usd);
    let kiosk_usd_rate = or_default(kiosk_usd_rate, defaults.default_kiosk_usd_rate).max(0.0);

    let path_direct_total = floor_to_i64(budget * kiosk_twd_rate);
    let usd_obtained = if bank_sell_usd > 0.0 {
        floor_to_i64(budget / bank_sell_usd)
    } else {
        0
    };
    let path_cross_total = floor_to_i64(usd_obtained as f64 * kiosk_usd_rate);

    let recommended_path = if path_direct_total >= path_cross_total {
        ConversionPath::Direct
    } else {
        ConversionPath::Cross
    };

    ComparisonResult {
        path_direct_total,
        usd_obtained,
        path_cross_total,
        absolute_difference: (path_direct_total - path_cross_total).abs(),
        recommended_path,
    }
}

pub fn compare_snapshot(budget: f64, snapshot: &RateSnapshot, defaults: &ComparisonConfig) -> ComparisonResult {
    compare(
        budget,
        snapshot.bank_sell_usd,
        snapshot.kiosk_twd_rate,
        snapshot.kiosk_usd_rate,
        defaults,
    )
}
