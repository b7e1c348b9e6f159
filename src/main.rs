use std::io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod backend;
mod console;
mod datetime;
mod filter;
mod format;
mod group;
mod normalize;
mod preferences;
mod report_command;
mod stats;
mod summary_command;
mod time_entry;

use backend::CrmClient;
use console::{ConsoleMarkdownReport, ConsolePresenter};
use group::Dimension;
use preferences::{resolve_dimension, resolve_filter, Preferences};
use report_command::{ReportArgs, ReportCommand};
use stats::SummaryOptions;
use summary_command::{SummaryArgs, SummaryCommand};

/// time entryを集計するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- summary --range week
/// $ cargo run -- report --group-by client --billable-only
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(subcommand)]
    subcommand: SubCommands,

    #[clap(
        short = 'v',
        long = "verbose",
        help = "Enables debug logging",
        global = true
    )]
    verbose: bool,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    Summary(SummaryArgs),
    Report(ReportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.verbose).context("Failed to initialize the logger")?;

    let backend = CrmClient::new().context("Failed to new CRM client")?;
    let preferences = Preferences::load();
    let mut stdout = io::stdout();
    let mut presenter = ConsoleMarkdownReport::new(&mut stdout);

    match args.subcommand {
        SubCommands::Summary(summary) => {
            let resolved = resolve_filter(&summary.filter, &preferences)?;
            let top = resolve_dimension(summary.top, &preferences, Dimension::Client);
            let options = SummaryOptions {
                default_hourly_rate: resolved.default_hourly_rate,
                bounds: resolved.criteria.bounds.clone(),
                top_dimension: top,
            };

            let command = SummaryCommand::new(&backend);
            let result = command.run(&resolved.criteria, &options).await?;
            presenter.show_summary(&result)?;

            if summary.save {
                Preferences::from_resolved(&resolved, top)
                    .save()
                    .context("Failed to save preferences")?;
            }
        }
        SubCommands::Report(report) => {
            let resolved = resolve_filter(&report.filter, &preferences)?;
            let dimension = resolve_dimension(report.group_by, &preferences, Dimension::Client);

            let command = ReportCommand::new(&backend);
            let output = command
                .run(&resolved.criteria, dimension, resolved.default_hourly_rate)
                .await?;
            presenter.show_groups(dimension, &output.groups, &output.summary)?;
            if report.entries {
                presenter.show_time_entries(&output.entries)?;
            }

            if report.save {
                Preferences::from_resolved(&resolved, dimension)
                    .save()
                    .context("Failed to save preferences")?;
            }
        }
    }

    Ok(())
}

/// ロガーを初期化する。
fn setup_logger(verbose: bool) -> Result<()> {
    let colors = fern::colors::ColoredLevelConfig::new()
        .info(fern::colors::Color::Green)
        .warn(fern::colors::Color::Yellow)
        .error(fern::colors::Color::Red);
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
        .context("Failed to apply the logger configuration")?;

    Ok(())
}
