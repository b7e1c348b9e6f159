use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;

use crate::format::{billable_percentage, format_duration, format_hours, format_money, percentage};
use crate::group::{AggregationGroup, Dimension};
use crate::stats::StatisticsSummary;
use crate::time_entry::TimeEntry;

/// Consoleへ集計結果を表示するためのtrait。
pub trait ConsolePresenter {
    /// 集計サマリを表示する。
    fn show_summary(&mut self, summary: &StatisticsSummary) -> Result<()>;

    /// グループごとの集計結果と合計行を表示する。
    fn show_groups(
        &mut self,
        dimension: Dimension,
        groups: &[AggregationGroup],
        summary: &StatisticsSummary,
    ) -> Result<()>;

    /// タイムエントリーを表示する。
    ///
    /// # Arguments
    ///
    /// * `time_entries` - 表示するタイムエントリー
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()>;
}

/// 集計結果をMarkdownのlist形式で表示する。
pub struct ConsoleMarkdownReport<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownReport<'a, W> {
    /// 新しい`ConsoleMarkdownReport`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownReport<'a, W> {
    fn show_summary(&mut self, summary: &StatisticsSummary) -> Result<()> {
        writeln!(self.writer, "## Summary").context("Failed to write summary")?;
        writeln!(self.writer, "- entries: {}", summary.entry_count)
            .context("Failed to write summary")?;
        writeln!(
            self.writer,
            "- total: {}",
            format_duration(summary.total_minutes)
        )
        .context("Failed to write summary")?;
        writeln!(
            self.writer,
            "- billable: {} ({:.0}%)",
            format_duration(summary.billable_minutes),
            percentage(summary.billable_minutes, summary.total_minutes)
        )
        .context("Failed to write summary")?;
        writeln!(
            self.writer,
            "- non billable: {}",
            format_duration(summary.non_billable_minutes)
        )
        .context("Failed to write summary")?;
        writeln!(
            self.writer,
            "- revenue: {}",
            format_money(summary.total_revenue)
        )
        .context("Failed to write summary")?;
        writeln!(
            self.writer,
            "- average per day: {} hours",
            format_hours(summary.avg_minutes_per_day)
        )
        .context("Failed to write summary")?;
        writeln!(
            self.writer,
            "- top: {} ({})",
            summary.top_group_name,
            format_duration(summary.top_group_minutes)
        )
        .context("Failed to write summary")?;

        Ok(())
    }

    fn show_groups(
        &mut self,
        dimension: Dimension,
        groups: &[AggregationGroup],
        summary: &StatisticsSummary,
    ) -> Result<()> {
        let title = match dimension {
            Dimension::None => "## All entries".to_string(),
            dimension => format!("## By {}", dimension),
        };
        writeln!(self.writer, "{}", title).context("Failed to write group report")?;

        for group in groups {
            writeln!(
                self.writer,
                "- {}: {} ({:.0}% billable, {}, {} entries)",
                group.name,
                format_duration(group.total_minutes),
                billable_percentage(group),
                format_money(group.revenue),
                group.entry_count
            )
            .with_context(|| format!("Failed to write group: {:?}", group))?;
        }

        writeln!(
            self.writer,
            "- total: {} ({}, {} entries)",
            format_duration(summary.total_minutes),
            format_money(summary.total_revenue),
            summary.entry_count
        )
        .context("Failed to write group report")?;

        Ok(())
    }

    // time entryをlist形式で表示する。
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()> {
        let mut sorted_entries = time_entries.to_vec();
        sorted_entries.sort_by_key(|entry| entry.start);

        for entry in sorted_entries {
            let start_str = entry
                .start
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string();
            let end_str = entry
                .stop
                .map(|stop| stop.with_timezone(&Local).format("%H:%M").to_string())
                .unwrap_or_else(|| "now".to_string());
            writeln!(
                self.writer,
                "- {} ~ {}: {} ({})",
                start_str,
                end_str,
                entry.description,
                format_duration(entry.duration_minutes)
            )
            .with_context(|| format!("Failed to write time entry: {:?}", entry))?;
        }

        Ok(())
    }
}
