use anyhow::{Context, Result};
use log::info;

use crate::backend::CrmRepository;
use crate::filter::{filter_entries, FilterArgs, FilterCriteria};
use crate::group::{group_entries, AggregationGroup, Dimension};
use crate::normalize::{normalize_all, Lookups};
use crate::stats::{summarize, StatisticsSummary, SummaryOptions};
use crate::time_entry::TimeEntry;

/// グループごとの集計を出力するためのサブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ReportArgs {
    #[clap(flatten)]
    pub filter: FilterArgs,

    #[clap(
        short = 'g',
        long = "group-by",
        help = "Sets the grouping dimension (user, client, project, date, none)",
        parse(try_from_str),
    )]
    pub group_by: Option<Dimension>,

    #[clap(long = "entries", help = "Also lists the individual entries")]
    pub entries: bool,

    #[clap(long = "save", help = "Saves the merged filters as future defaults")]
    pub save: bool,
}

/// `report`サブコマンドの計算結果。
#[derive(Debug)]
pub struct ReportOutput {
    pub groups: Vec<AggregationGroup>,
    pub summary: StatisticsSummary,
    pub entries: Vec<TimeEntry>,
}

pub struct ReportCommand<'a, T: CrmRepository> {
    backend: &'a T,
}

impl<'a, T: CrmRepository> ReportCommand<'a, T> {
    /// 新しい`ReportCommand`を返す。
    pub fn new(backend: &'a T) -> Self {
        Self { backend }
    }

    /// `report`サブコマンドの処理を行う。
    ///
    /// フィルタ済みのtime entryを指定の軸でグループへ集計し、合計行の
    /// ためのサマリも合わせて返す。
    ///
    /// # Arguments
    ///
    /// * `criteria` - 解決済みのフィルタ条件
    /// * `dimension` - グループの集計軸
    /// * `default_hourly_rate` - レート未設定のentryに適用する時間単価
    pub async fn run(
        &self,
        criteria: &FilterCriteria,
        dimension: Dimension,
        default_hourly_rate: f64,
    ) -> Result<ReportOutput> {
        let raw = self
            .backend
            .read_time_entries(&criteria.bounds)
            .await
            .context("Failed to retrieve time entries")?;
        let users = self
            .backend
            .read_users()
            .await
            .context("Failed to retrieve users")?;
        let clients = self
            .backend
            .read_clients()
            .await
            .context("Failed to retrieve clients")?;
        let projects = self
            .backend
            .read_projects()
            .await
            .context("Failed to retrieve projects")?;
        info!("Time entries retrieved successfully.");

        let lookups = Lookups::new(&users, &clients, &projects);
        let entries = normalize_all(&raw, &lookups);
        let filtered = filter_entries(&entries, criteria);
        info!("{} of {} entries matched the filters", filtered.len(), entries.len());

        let groups = group_entries(&filtered, dimension, &lookups, default_hourly_rate);
        let options = SummaryOptions {
            default_hourly_rate,
            bounds: criteria.bounds.clone(),
            top_dimension: dimension,
        };
        let summary = summarize(&filtered, &lookups, &options);

        Ok(ReportOutput {
            groups,
            summary,
            entries: filtered,
        })
    }
}
