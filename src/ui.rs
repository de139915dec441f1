//! Live terminal dashboard over the transfer store.
//!
//! The dashboard is a pure reader: it polls store snapshots on a fixed
//! tick and owns one indicatif bar per transfer. It never mutates transfer
//! state, and tolerates arbitrarily stale snapshots between polls.

use crate::error::{classify, FerryError, Result};
use crate::transfer::{Status, Transfer, TransferStore};
use colored::Colorize;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

/// Presentation configuration, passed by value into the renderer.
#[derive(Debug, Clone)]
pub struct DashboardTheme {
    /// Poll interval for store snapshots.
    pub tick: Duration,
    /// How long to keep the final frame up once all transfers settle.
    pub grace: Duration,
    /// Template for transfers with a known total size.
    pub bar_template: String,
    /// Template for pending transfers and unknown-size progress.
    pub spinner_template: String,
    pub progress_chars: String,
}

impl Default for DashboardTheme {
    fn default() -> Self {
        DashboardTheme {
            tick: Duration::from_millis(100),
            grace: Duration::from_secs(2),
            bar_template: "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}"
                .to_string(),
            spinner_template: "{spinner:.green} {prefix:.bold} {msg}".to_string(),
            progress_chars: "=> ".to_string(),
        }
    }
}

struct Styles {
    bar: ProgressStyle,
    spinner: ProgressStyle,
}

impl Styles {
    fn from_theme(theme: &DashboardTheme) -> Result<Self> {
        let bar = ProgressStyle::with_template(&theme.bar_template)
            .map_err(|err| FerryError::Config(format!("bad bar template: {err}")))?
            .progress_chars(&theme.progress_chars);
        let spinner = ProgressStyle::with_template(&theme.spinner_template)
            .map_err(|err| FerryError::Config(format!("bad spinner template: {err}")))?;
        Ok(Styles { bar, spinner })
    }
}

/// Render the store until nothing is pending or in progress, then hold the
/// final frame for the theme's grace delay and return.
///
/// Transfers should be added to the store before the dashboard starts;
/// records appearing later are picked up on the next tick, but an empty
/// store exits immediately.
pub async fn run_dashboard(store: TransferStore, theme: DashboardTheme) -> Result<()> {
    let styles = Styles::from_theme(&theme)?;
    let multi = MultiProgress::new();
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    loop {
        for transfer in store.get_all() {
            let bar = bars.entry(transfer.id.clone()).or_insert_with(|| {
                let bar = multi.add(ProgressBar::new(0));
                bar.set_style(styles.spinner.clone());
                bar.set_prefix(transfer.id.clone());
                bar
            });
            draw(bar, &styles, &transfer);
        }

        if store.stats().active() == 0 {
            break;
        }
        tokio::time::sleep(theme.tick).await;
    }

    tokio::time::sleep(theme.grace).await;
    Ok(())
}

fn draw(bar: &ProgressBar, styles: &Styles, transfer: &Transfer) {
    if bar.is_finished() {
        return;
    }
    match transfer.status {
        Status::Pending => {
            bar.set_message("waiting".dimmed().to_string());
            bar.tick();
        }
        Status::InProgress => {
            if transfer.bytes_total > 0 {
                bar.set_style(styles.bar.clone());
                bar.set_length(transfer.bytes_total);
                bar.set_position(transfer.bytes_copied);
                bar.set_message(format!("{:.0}%", transfer.progress));
            } else {
                bar.set_message(format!(
                    "{} copied ({:.0}%)",
                    HumanBytes(transfer.bytes_copied),
                    transfer.progress
                ));
                bar.tick();
            }
        }
        Status::Completed => {
            if transfer.bytes_total > 0 {
                bar.set_position(transfer.bytes_total);
            }
            bar.finish_with_message(
                format!("done in {:.1}s", transfer.duration().as_secs_f64())
                    .green()
                    .to_string(),
            );
        }
        Status::Failed => {
            let detail = transfer
                .error
                .as_ref()
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            bar.abandon_with_message(format!("{}", detail.red()));
        }
    }
}

/// Print a final per-status summary, with classified detail for failures.
pub fn render_summary(store: &TransferStore) {
    let stats = store.stats();
    println!(
        "{}: {} completed, {} failed, {} pending",
        "transfers".bold(),
        stats.completed.to_string().green(),
        stats.failed.to_string().red(),
        stats.pending
    );

    for transfer in store.get_all() {
        if transfer.status != Status::Failed {
            continue;
        }
        let Some(err) = transfer.error.as_ref() else {
            continue;
        };
        let classified = classify(err);
        println!(
            "  {} {} -> {}: {} [{}{}]",
            "failed".red().bold(),
            transfer.source,
            transfer.destination,
            err,
            classified.kind,
            if classified.retryable {
                ", retryable"
            } else {
                ""
            }
        );
    }
}
