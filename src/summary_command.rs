use anyhow::{Context, Result};
use log::info;

use crate::backend::CrmRepository;
use crate::filter::{filter_entries, FilterArgs, FilterCriteria};
use crate::group::Dimension;
use crate::normalize::{normalize_all, Lookups};
use crate::stats::{summarize, StatisticsSummary, SummaryOptions};

/// 集計サマリを出力するためのサブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct SummaryArgs {
    #[clap(flatten)]
    pub filter: FilterArgs,

    #[clap(
        long = "top",
        help = "Sets the dimension of the top group (user, client, project, date, none)",
        parse(try_from_str),
    )]
    pub top: Option<Dimension>,

    #[clap(long = "save", help = "Saves the merged filters as future defaults")]
    pub save: bool,
}

pub struct SummaryCommand<'a, T: CrmRepository> {
    backend: &'a T,
}

impl<'a, T: CrmRepository> SummaryCommand<'a, T> {
    /// 新しい`SummaryCommand`を返す。
    ///
    /// # Arguments
    /// * `backend` - CRMバックエンドと通信するためのリポジトリ
    pub fn new(backend: &'a T) -> Self {
        Self { backend }
    }

    /// `summary`サブコマンドの処理を行う。
    ///
    /// time entryと参照リストを取得して正規化し、フィルタ条件を適用した上で
    /// 集計サマリを計算する。
    ///
    /// # Arguments
    ///
    /// * `criteria` - 解決済みのフィルタ条件
    /// * `options` - 集計値計算の設定
    pub async fn run(
        &self,
        criteria: &FilterCriteria,
        options: &SummaryOptions,
    ) -> Result<StatisticsSummary> {
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

        Ok(summarize(&filtered, &lookups, options))
    }
}
