use chrono::Local;

use crate::datetime::{self, RangeBounds};
use crate::group::{effective_rate, group_entries, Dimension};
use crate::normalize::Lookups;
use crate::time_entry::TimeEntry;

/// レートが未設定のentryに適用する既定の時間単価。
pub const DEFAULT_HOURLY_RATE: f64 = 150.0;

/// グループが1つもない場合のtop groupの表示名。
pub const EMPTY_TOP_GROUP: &str = "-";

/// 集計値計算の設定。
#[derive(Clone, Debug)]
pub struct SummaryOptions {
    pub default_hourly_rate: f64,
    /// フィルタで利用した時間窓。1日あたりの平均時間の分母に利用する。
    pub bounds: RangeBounds,
    /// top groupを求める集計軸。
    pub top_dimension: Dimension,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            default_hourly_rate: DEFAULT_HOURLY_RATE,
            bounds: RangeBounds::Unbounded,
            top_dimension: Dimension::Client,
        }
    }
}

/// フィルタ済みのtime entryから計算した集計値。永続化はしない。
#[derive(Clone, Debug, PartialEq)]
pub struct StatisticsSummary {
    pub total_minutes: i64,
    pub billable_minutes: i64,
    pub non_billable_minutes: i64,
    pub total_revenue: f64,
    pub avg_minutes_per_day: f64,
    pub top_group_name: String,
    pub top_group_minutes: i64,
    pub entry_count: usize,
}

/// time entryの集計値を計算する。
///
/// 入力だけから決まる純粋な関数で、空の入力では全て0のサマリを返す。
pub fn summarize(
    entries: &[TimeEntry],
    lookups: &Lookups,
    options: &SummaryOptions,
) -> StatisticsSummary {
    let total_minutes: i64 = entries.iter().map(|entry| entry.duration_minutes).sum();
    let billable_minutes: i64 = entries
        .iter()
        .filter(|entry| entry.billable)
        .map(|entry| entry.duration_minutes)
        .sum();
    let total_revenue: f64 = entries
        .iter()
        .filter(|entry| entry.billable)
        .map(|entry| {
            entry.duration_minutes as f64 / 60.0 * effective_rate(entry, options.default_hourly_rate)
        })
        .sum();

    let days = day_count(entries, &options.bounds);
    let avg_minutes_per_day = total_minutes as f64 / days.max(1) as f64;

    let top = group_entries(entries, options.top_dimension, lookups, options.default_hourly_rate)
        .into_iter()
        .next();
    let (top_group_name, top_group_minutes) = match top {
        Some(group) => (group.name, group.total_minutes),
        None => (EMPTY_TOP_GROUP.to_string(), 0),
    };

    StatisticsSummary {
        total_minutes,
        billable_minutes,
        non_billable_minutes: total_minutes - billable_minutes,
        total_revenue,
        avg_minutes_per_day,
        top_group_name,
        top_group_minutes,
        entry_count: entries.len(),
    }
}

/// 平均の分母となる暦日数を返す。
///
/// 時間窓が閉じていない場合は最古のentryから今日までを数える。
fn day_count(entries: &[TimeEntry], bounds: &RangeBounds) -> i64 {
    if let Some(days) = bounds.day_count() {
        return days;
    }

    let earliest = entries.iter().map(|entry| entry.start).min();
    match earliest {
        Some(start) => {
            let start = start.with_timezone(&Local).date_naive();
            let today = datetime::now().with_timezone(&Local).date_naive();
            (today - start).num_days() + 1
        }
        None => 0,
    }
}
