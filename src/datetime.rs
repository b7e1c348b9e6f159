use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, TimeZone, Utc};

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// 集計対象のtime entryを絞り込むための期間指定。
///
/// 名前付きの期間はLocalタイムゾーンの暦に沿って解決する。
#[derive(Clone, Debug, PartialEq)]
pub enum DateRange {
    Today,
    Week,
    Month,
    Quarter,
    Year,
    All,
    Custom {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

/// `DateRange`を解決した実際の時間窓。
///
/// `Between`の両端は閉区間として扱う。`Empty`はどのtime entryにも一致しない。
#[derive(Clone, Debug, PartialEq)]
pub enum RangeBounds {
    Unbounded,
    Between(DateTime<Utc>, DateTime<Utc>),
    Empty,
}

impl DateRange {
    /// 期間指定を実際の時間窓へ解決する。
    ///
    /// 週は元のダッシュボードのロケールに合わせて日曜始まりとする。
    /// カスタム期間は`from > to`の場合に`Empty`、端点が欠けている場合に
    /// `Unbounded`となる。
    pub fn resolve(&self) -> Result<RangeBounds> {
        let now = now();
        let today = now.with_timezone(&Local).date_naive();

        let bounds = match self {
            DateRange::Today => RangeBounds::Between(start_of_day(today)?, now),
            DateRange::Week => {
                let from = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
                between(from, from + Duration::days(6))?
            }
            DateRange::Month => {
                let from = today.with_day0(0).context("Failed to set day")?;
                let to = from
                    .checked_add_months(Months::new(1))
                    .context("Failed to add month")?
                    - Duration::days(1);
                between(from, to)?
            }
            DateRange::Quarter => {
                let from = NaiveDate::from_ymd_opt(today.year(), (today.month0() / 3) * 3 + 1, 1)
                    .context("Failed to set quarter start")?;
                let to = from
                    .checked_add_months(Months::new(3))
                    .context("Failed to add months")?
                    - Duration::days(1);
                between(from, to)?
            }
            DateRange::Year => {
                let from = NaiveDate::from_ymd_opt(today.year(), 1, 1)
                    .context("Failed to set year start")?;
                let to = NaiveDate::from_ymd_opt(today.year(), 12, 31)
                    .context("Failed to set year end")?;
                between(from, to)?
            }
            DateRange::All => RangeBounds::Unbounded,
            DateRange::Custom { from, to } => match (from, to) {
                (Some(from), Some(to)) if from > to => RangeBounds::Empty,
                (Some(from), Some(to)) => {
                    // toは日付指定なのでその日の終わりまで含める
                    RangeBounds::Between(*from, *to + Duration::days(1) - Duration::seconds(1))
                }
                _ => RangeBounds::Unbounded,
            },
        };

        Ok(bounds)
    }
}

impl FromStr for DateRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "today" => Ok(DateRange::Today),
            "week" => Ok(DateRange::Week),
            "month" => Ok(DateRange::Month),
            "quarter" => Ok(DateRange::Quarter),
            "year" => Ok(DateRange::Year),
            "all" => Ok(DateRange::All),
            _ => bail!("Unknown date range: {}", s),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DateRange::Today => "today",
            DateRange::Week => "week",
            DateRange::Month => "month",
            DateRange::Quarter => "quarter",
            DateRange::Year => "year",
            DateRange::All => "all",
            DateRange::Custom { .. } => "custom",
        };
        write!(f, "{}", name)
    }
}

impl RangeBounds {
    /// 指定時刻が時間窓に含まれるかを返す。
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        match self {
            RangeBounds::Unbounded => true,
            RangeBounds::Between(from, to) => from <= at && at <= to,
            RangeBounds::Empty => false,
        }
    }

    /// 時間窓に含まれるLocalタイムゾーンの暦日数を返す。
    ///
    /// 窓が閉じていない場合はNoneを返す。
    pub fn day_count(&self) -> Option<i64> {
        match self {
            RangeBounds::Between(from, to) => {
                let from = from.with_timezone(&Local).date_naive();
                let to = to.with_timezone(&Local).date_naive();
                Some((to - from).num_days() + 1)
            }
            _ => None,
        }
    }
}

/// Localタイムゾーンで1日の始まりと終わりを両端とする時間窓を作る。
fn between(from: NaiveDate, to: NaiveDate) -> Result<RangeBounds> {
    Ok(RangeBounds::Between(start_of_day(from)?, end_of_day(to)?))
}

fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .context("Failed to set hour, minute, and second")?;
    Ok(Local
        .from_local_datetime(&naive)
        .single()
        .context("Failed to convert to DateTime<Local>")?
        .to_utc())
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(23, 59, 59)
        .context("Failed to set hour, minute, and second")?;
    Ok(Local
        .from_local_datetime(&naive)
        .single()
        .context("Failed to convert to DateTime<Local>")?
        .to_utc())
}


#[cfg(test)]
pub use mock_datetime::now;
