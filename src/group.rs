use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::Local;

use crate::normalize::Lookups;
use crate::time_entry::TimeEntry;

/// グループの表示色パレット。
///
/// 参照リスト内の位置でパレットを引くため、同じ参照リストに対しては
/// 常に同じ色が割り当たる。
pub const PALETTE: [&str; 10] = [
    "#3b82f6", "#ef4444", "#22c55e", "#f59e0b", "#8b5cf6", "#ec4899", "#06b6d4", "#84cc16",
    "#f97316", "#6366f1",
];

/// 日付グループなど、パレットを使わないグループの色。
pub const DEFAULT_COLOR: &str = "#1e3a8a";

/// グループ集計の軸。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dimension {
    User,
    Client,
    Project,
    Date,
    None,
}

impl FromStr for Dimension {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Dimension::User),
            "client" => Ok(Dimension::Client),
            "project" => Ok(Dimension::Project),
            "date" => Ok(Dimension::Date),
            "none" => Ok(Dimension::None),
            _ => bail!("Unknown dimension: {}", s),
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dimension::User => "user",
            Dimension::Client => "client",
            Dimension::Project => "project",
            Dimension::Date => "date",
            Dimension::None => "none",
        };
        write!(f, "{}", name)
    }
}

/// グループ集計が返す1バケット分の結果。永続化はしない。
#[derive(Clone, Debug, PartialEq)]
pub struct AggregationGroup {
    pub id: String,
    pub name: String,
    pub total_minutes: i64,
    pub billable_minutes: i64,
    pub revenue: f64,
    pub entry_count: usize,
    pub color: String,
}

/// entryのレートが設定されていればそれを、なければ既定レートを返す。
///
/// 正規化で欠損レートは0になっているため、0は未設定として扱う。
pub fn effective_rate(entry: &TimeEntry, default_hourly_rate: f64) -> f64 {
    if entry.hourly_rate > 0.0 {
        entry.hourly_rate
    } else {
        default_hourly_rate
    }
}

/// time entryを指定の軸でグループへ分配し、バケットごとの合計を集計する。
///
/// 結果は合計時間の降順に並ぶ。同値のバケットは最初に出現した順を保つ。
pub fn group_entries(
    entries: &[TimeEntry],
    dimension: Dimension,
    lookups: &Lookups,
    default_hourly_rate: f64,
) -> Vec<AggregationGroup> {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<AggregationGroup> = Vec::new();

    for entry in entries {
        let (id, name, color) = group_identity(entry, dimension, lookups);
        let index = match order.get(&id) {
            Some(index) => *index,
            None => {
                order.insert(id.clone(), groups.len());
                groups.push(AggregationGroup {
                    id,
                    name,
                    total_minutes: 0,
                    billable_minutes: 0,
                    revenue: 0.0,
                    entry_count: 0,
                    color,
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[index];
        group.total_minutes += entry.duration_minutes;
        group.entry_count += 1;
        if entry.billable {
            group.billable_minutes += entry.duration_minutes;
            group.revenue +=
                entry.duration_minutes as f64 / 60.0 * effective_rate(entry, default_hourly_rate);
        }
    }

    // sort_byは安定なので同値のバケットは出現順のまま
    groups.sort_by(|a, b| b.total_minutes.cmp(&a.total_minutes));
    groups
}

/// entryが属するグループのキー、表示名、色を導出する。
fn group_identity(
    entry: &TimeEntry,
    dimension: Dimension,
    lookups: &Lookups,
) -> (String, String, String) {
    match dimension {
        Dimension::User => (
            entry.user_id.clone(),
            entry.user_name.clone(),
            palette_color(lookups.user_position(&entry.user_id)),
        ),
        Dimension::Client => (
            entry.client_id.clone().unwrap_or_else(|| "none".to_string()),
            entry.client_name.clone(),
            palette_color(
                entry
                    .client_id
                    .as_deref()
                    .and_then(|id| lookups.client_position(id)),
            ),
        ),
        Dimension::Project => (
            entry.project_id.clone().unwrap_or_else(|| "none".to_string()),
            entry.project_name.clone(),
            palette_color(
                entry
                    .project_id
                    .as_deref()
                    .and_then(|id| lookups.project_position(id)),
            ),
        ),
        Dimension::Date => {
            let date = entry
                .start
                .with_timezone(&Local)
                .date_naive()
                .format("%Y-%m-%d")
                .to_string();
            (date.clone(), date, DEFAULT_COLOR.to_string())
        }
        Dimension::None => (
            "all".to_string(),
            "all entries".to_string(),
            DEFAULT_COLOR.to_string(),
        ),
    }
}

fn palette_color(position: Option<usize>) -> String {
    match position {
        Some(position) => PALETTE[position % PALETTE.len()].to_string(),
        None => DEFAULT_COLOR.to_string(),
    }
}
