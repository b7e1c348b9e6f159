use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::datetime::DateRange;
use crate::filter::{parse_date, FilterArgs, FilterCriteria, Selection};
use crate::group::Dimension;
use crate::stats::DEFAULT_HOURLY_RATE;

/// 前回利用したフィルタ条件を次回の既定値として保存する構造体。
///
/// 元のダッシュボードがlocalStorageへ保存していた内容に相当する。
/// 読み書きはアプリケーション境界(main)でのみ行い、集計パイプラインは
/// この構造体へ依存しない。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Preferences {
    pub range: Option<String>,
    pub custom_from: Option<String>,
    pub custom_to: Option<String>,
    pub group_by: Option<String>,
    pub user: Option<String>,
    pub client: Option<String>,
    pub project: Option<String>,
    pub billable_only: Option<bool>,
    pub search: Option<String>,
    pub default_hourly_rate: Option<f64>,
}

impl Preferences {
    /// 保存済みの設定を読み込む。
    ///
    /// ファイルがない場合は既定値、壊れている場合は警告を出して既定値を返す。
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(preferences) => preferences,
            Err(err) => {
                warn!("Failed to load preferences: {:#}", err);
                Self::default()
            }
        }
    }

    fn try_load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let body = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&body).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// 設定をファイルへ保存する。
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let dir = path.parent().context("Preferences path has no parent")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let body = serde_json::to_string_pretty(self).context("Failed to serialize preferences")?;
        fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Failed to locate the user config directory")?;
        Ok(dir.join("timerep").join("preferences.json"))
    }

    /// 解決済みのフィルタ条件から保存用の設定を作る。
    pub fn from_resolved(resolved: &ResolvedFilter, group_by: Dimension) -> Self {
        let (range, custom_from, custom_to) = match &resolved.range {
            DateRange::Custom { from, to } => (
                Some("custom".to_string()),
                from.map(format_pref_date),
                to.map(format_pref_date),
            ),
            range => (Some(range.to_string()), None, None),
        };

        Self {
            range,
            custom_from,
            custom_to,
            group_by: Some(group_by.to_string()),
            user: Some(resolved.criteria.user.to_string()),
            client: Some(resolved.criteria.client.to_string()),
            project: Some(resolved.criteria.project.to_string()),
            billable_only: Some(resolved.criteria.billable_only),
            search: resolved.criteria.search.clone(),
            default_hourly_rate: Some(resolved.default_hourly_rate),
        }
    }
}

/// コマンドライン引数と保存済み設定をマージした結果。
#[derive(Clone, Debug)]
pub struct ResolvedFilter {
    pub criteria: FilterCriteria,
    pub range: DateRange,
    pub default_hourly_rate: f64,
}

/// コマンドライン引数と保存済み設定からフィルタ条件を組み立てる。
///
/// 明示されたコマンドライン引数が常に保存済み設定より優先される。
/// どちらにもない項目は既定値(期間はmonth、レートは150)へ倒す。
pub fn resolve_filter(args: &FilterArgs, preferences: &Preferences) -> Result<ResolvedFilter> {
    let range = resolve_range(args, preferences);
    let bounds = range.resolve().context("Failed to resolve the date range")?;

    let criteria = FilterCriteria {
        bounds,
        user: resolve_selection(&args.user, &preferences.user),
        client: resolve_selection(&args.client, &preferences.client),
        project: resolve_selection(&args.project, &preferences.project),
        billable_only: args.billable_only || preferences.billable_only.unwrap_or(false),
        search: args.search.clone().or_else(|| preferences.search.clone()),
    };
    let default_hourly_rate = args
        .default_hourly_rate
        .or(preferences.default_hourly_rate)
        .unwrap_or(DEFAULT_HOURLY_RATE);

    Ok(ResolvedFilter {
        criteria,
        range,
        default_hourly_rate,
    })
}

/// 集計軸の指定と保存済み設定をマージする。
pub fn resolve_dimension(
    flag: Option<Dimension>,
    preferences: &Preferences,
    fallback: Dimension,
) -> Dimension {
    if let Some(dimension) = flag {
        return dimension;
    }
    if let Some(saved) = &preferences.group_by {
        match saved.parse() {
            Ok(dimension) => return dimension,
            Err(err) => warn!("Ignoring saved group_by: {:#}", err),
        }
    }
    fallback
}

fn resolve_range(args: &FilterArgs, preferences: &Preferences) -> DateRange {
    if args.from.is_some() || args.to.is_some() {
        return DateRange::Custom {
            from: args.from,
            to: args.to,
        };
    }
    if let Some(range) = &args.range {
        return range.clone();
    }
    if let Some(saved) = &preferences.range {
        if saved == "custom" {
            return DateRange::Custom {
                from: parse_pref_date(&preferences.custom_from),
                to: parse_pref_date(&preferences.custom_to),
            };
        }
        match saved.parse() {
            Ok(range) => return range,
            Err(err) => warn!("Ignoring saved range: {:#}", err),
        }
    }

    DateRange::Month
}

fn resolve_selection(flag: &Option<Selection>, saved: &Option<String>) -> Selection {
    if let Some(selection) = flag {
        return selection.clone();
    }
    match saved {
        // Selectionのパースは失敗しない
        Some(saved) => saved.parse().unwrap_or(Selection::All),
        None => Selection::All,
    }
}

fn parse_pref_date(saved: &Option<String>) -> Option<DateTime<Utc>> {
    let saved = saved.as_deref()?;
    match parse_date(saved) {
        Ok(date) => Some(date),
        Err(err) => {
            warn!("Ignoring saved custom date: {:#}", err);
            None
        }
    }
}

fn format_pref_date(date: DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Local, TimeZone, Utc};
    use rstest::rstest;

    use super::{resolve_dimension, resolve_filter, Preferences};
    use crate::datetime::{mock_datetime, DateRange, RangeBounds};
    use crate::filter::{FilterArgs, Selection};
    use crate::group::Dimension;
    use crate::stats::DEFAULT_HOURLY_RATE;

    fn local(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Local.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap().to_utc()
    }

    /// 引数も保存済み設定もない場合の既定値を確認する。
    #[test]
    fn test_resolve_filter_defaults() {
        mock_datetime::set_mock_time(local(2024, 5, 15));

        let resolved = resolve_filter(&FilterArgs::default(), &Preferences::default()).unwrap();

        assert_eq!(resolved.range, DateRange::Month);
        assert_eq!(resolved.criteria.user, Selection::All);
        assert!(!resolved.criteria.billable_only);
        assert_eq!(resolved.default_hourly_rate, DEFAULT_HOURLY_RATE);
    }

    /// コマンドライン引数が保存済み設定より優先されることを確認する。
    #[test]
    fn test_resolve_filter_args_win() {
        let args = FilterArgs {
            range: Some(DateRange::Week),
            user: Some(Selection::Id("u1".to_string())),
            default_hourly_rate: Some(200.0),
            ..FilterArgs::default()
        };
        let preferences = Preferences {
            range: Some("year".to_string()),
            user: Some("u9".to_string()),
            default_hourly_rate: Some(100.0),
            ..Preferences::default()
        };

        let resolved = resolve_filter(&args, &preferences).unwrap();

        assert_eq!(resolved.range, DateRange::Week);
        assert_eq!(resolved.criteria.user, Selection::Id("u1".to_string()));
        assert_eq!(resolved.default_hourly_rate, 200.0);
    }

    /// 保存済み設定が引数のない項目を補完することを確認する。
    #[test]
    fn test_resolve_filter_uses_saved_values() {
        let preferences = Preferences {
            range: Some("all".to_string()),
            client: Some("c1".to_string()),
            billable_only: Some(true),
            search: Some("login".to_string()),
            ..Preferences::default()
        };

        let resolved = resolve_filter(&FilterArgs::default(), &preferences).unwrap();

        assert_eq!(resolved.range, DateRange::All);
        assert_eq!(resolved.criteria.bounds, RangeBounds::Unbounded);
        assert_eq!(resolved.criteria.client, Selection::Id("c1".to_string()));
        assert!(resolved.criteria.billable_only);
        assert_eq!(resolved.criteria.search, Some("login".to_string()));
    }

    /// from/toの指定でカスタム期間になることを確認する。
    #[test]
    fn test_resolve_filter_custom_range() {
        let args = FilterArgs {
            from: Some(local(2024, 5, 1)),
            to: Some(local(2024, 5, 10)),
            ..FilterArgs::default()
        };

        let resolved = resolve_filter(&args, &Preferences::default()).unwrap();

        assert_eq!(
            resolved.range,
            DateRange::Custom {
                from: Some(local(2024, 5, 1)),
                to: Some(local(2024, 5, 10)),
            }
        );
    }

    /// 壊れた保存値は無視して既定値へ倒れることを確認する。
    #[test]
    fn test_resolve_filter_ignores_broken_saved_range() {
        let preferences = Preferences {
            range: Some("fortnight".to_string()),
            ..Preferences::default()
        };

        let resolved = resolve_filter(&FilterArgs::default(), &preferences).unwrap();

        assert_eq!(resolved.range, DateRange::Month);
    }

    /// 集計軸のマージを確認する。
    #[rstest]
    #[case::flag_wins(Some(Dimension::User), Some("project".to_string()), Dimension::User)]
    #[case::saved(None, Some("project".to_string()), Dimension::Project)]
    #[case::broken_saved(None, Some("tag".to_string()), Dimension::Client)]
    #[case::fallback(None, None, Dimension::Client)]
    fn test_resolve_dimension(
        #[case] flag: Option<Dimension>,
        #[case] saved: Option<String>,
        #[case] expected: Dimension,
    ) {
        let preferences = Preferences {
            group_by: saved,
            ..Preferences::default()
        };

        assert_eq!(
            resolve_dimension(flag, &preferences, Dimension::Client),
            expected
        );
    }

    /// 解決済みの条件を保存して再度読み込むと同じ条件になることを確認する。
    #[test]
    fn test_from_resolved_round_trip() {
        mock_datetime::set_mock_time(local(2024, 5, 15));
        let args = FilterArgs {
            from: Some(local(2024, 5, 1)),
            to: Some(local(2024, 5, 10)),
            client: Some(Selection::Id("c1".to_string())),
            billable_only: true,
            ..FilterArgs::default()
        };
        let resolved = resolve_filter(&args, &Preferences::default()).unwrap();

        let preferences = Preferences::from_resolved(&resolved, Dimension::Project);
        let reloaded = resolve_filter(&FilterArgs::default(), &preferences).unwrap();

        assert_eq!(reloaded.range, resolved.range);
        assert_eq!(reloaded.criteria, resolved.criteria);
        assert_eq!(
            resolve_dimension(None, &preferences, Dimension::Client),
            Dimension::Project
        );
    }
}
