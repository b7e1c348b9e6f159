use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use crate::datetime::{DateRange, RangeBounds};
use crate::time_entry::TimeEntry;

/// id系フィルタの指定。`all`で絞り込みを行わない。
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    All,
    Id(String),
}

impl Selection {
    /// entryのidが指定と一致するかを返す。
    pub fn matches(&self, id: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Id(want) => id == Some(want.as_str()),
        }
    }
}

impl FromStr for Selection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Selection::All)
        } else {
            Ok(Selection::Id(s.to_string()))
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::All => write!(f, "all"),
            Selection::Id(id) => write!(f, "{}", id),
        }
    }
}

/// フィルタ処理へ渡す解決済みの条件。
///
/// `bounds`は`DateRange::resolve`の結果であり、条件の組み立ては
/// アプリケーション境界(main)で行う。
#[derive(Clone, Debug, PartialEq)]
pub struct FilterCriteria {
    pub bounds: RangeBounds,
    pub user: Selection,
    pub client: Selection,
    pub project: Selection,
    pub billable_only: bool,
    pub search: Option<String>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            bounds: RangeBounds::Unbounded,
            user: Selection::All,
            client: Selection::All,
            project: Selection::All,
            billable_only: false,
            search: None,
        }
    }
}

/// フィルタ条件を指定する共通のコマンドライン引数。
#[derive(Debug, Default, clap::Args)]
pub struct FilterArgs {
    #[clap(
        short = 'r',
        long = "range",
        help = "Sets the date range (today, week, month, quarter, year, all)",
        parse(try_from_str),
    )]
    pub range: Option<DateRange>,

    #[clap(
        long = "from",
        help = "Sets a custom range start in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    pub from: Option<DateTime<Utc>>,

    #[clap(
        long = "to",
        help = "Sets a custom range end in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    pub to: Option<DateTime<Utc>>,

    #[clap(
        short = 'u',
        long = "user",
        help = "Filters by user id ('all' to disable)",
        parse(try_from_str),
    )]
    pub user: Option<Selection>,

    #[clap(
        short = 'c',
        long = "client",
        help = "Filters by client id ('all' to disable)",
        parse(try_from_str),
    )]
    pub client: Option<Selection>,

    #[clap(
        short = 'p',
        long = "project",
        help = "Filters by project id ('all' to disable)",
        parse(try_from_str),
    )]
    pub project: Option<Selection>,

    #[clap(short = 'b', long = "billable-only", help = "Keeps billable entries only")]
    pub billable_only: bool,

    #[clap(
        short = 's',
        long = "search",
        help = "Keeps entries matching a case-insensitive substring"
    )]
    pub search: Option<String>,

    #[clap(
        long = "rate",
        help = "Sets the default hourly rate for entries without one",
        parse(try_from_str),
    )]
    pub default_hourly_rate: Option<f64>,
}

/// 日付をパースする。
pub fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let naive_date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Failed to parse date: {}", s))?;
    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .context("Failed to set hour, minute, and second")?;
    let datetime = Local
        .from_local_datetime(&naive_datetime)
        .single()
        .context("Failed to convert to DateTime<Local>")?
        .to_utc();

    Ok(datetime)
}

/// time entryへフィルタ条件を適用する。
///
/// 純粋な関数で入力を変更せず、入力の順序を保つ。durationが0のentryも
/// 除外しない。
pub fn filter_entries(entries: &[TimeEntry], criteria: &FilterCriteria) -> Vec<TimeEntry> {
    entries
        .iter()
        .filter(|entry| matches(entry, criteria))
        .cloned()
        .collect()
}

fn matches(entry: &TimeEntry, criteria: &FilterCriteria) -> bool {
    if !criteria.bounds.contains(&entry.start) {
        return false;
    }
    if !criteria.user.matches(Some(entry.user_id.as_str())) {
        return false;
    }
    if !criteria.client.matches(entry.client_id.as_deref()) {
        return false;
    }
    if !criteria.project.matches(entry.project_id.as_deref()) {
        return false;
    }
    if criteria.billable_only && !entry.billable {
        return false;
    }
    if let Some(search) = &criteria.search {
        let needle = search.to_lowercase();
        let found = [
            &entry.description,
            &entry.project_name,
            &entry.client_name,
            &entry.user_name,
        ]
        .iter()
        .any(|hay| hay.to_lowercase().contains(&needle));
        if !found {
            return false;
        }
    }

    true
}
