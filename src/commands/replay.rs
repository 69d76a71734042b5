//! Replay command implementation

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{error, info};
use trend_signal_engine::replay::{run_replay, ReplayReport};
use trend_signal_engine::{data, Config, Symbol};

pub fn run(config_path: String, symbols_override: Option<String>, json: bool) -> Result<()> {
    info!("Starting replay");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let symbols: Vec<Symbol> = match symbols_override {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Symbol::new)
            .collect(),
        None => config.symbols(),
    };
    if symbols.is_empty() {
        anyhow::bail!("No symbols to replay: set replay.symbols or session.symbol, or pass --symbols");
    }

    // Fail on configuration errors before any data is read
    let sessions = symbols
        .iter()
        .map(|symbol| config.build_session(symbol))
        .collect::<Result<Vec<_>>>()?;

    let settings = config.replay_settings();
    let aux_timeframes = config.aux_timeframes();
    info!(
        symbols = symbols.len(),
        data_dir = %config.replay.data_dir,
        timeframe = %config.session.timeframe,
        ?aux_timeframes,
        "Replaying"
    );

    let pb = ProgressBar::new(sessions.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}] {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("█░ "),
    );

    let results: Vec<(Symbol, Result<ReplayReport>)> = sessions
        .into_par_iter()
        .map(|mut session| {
            let symbol = session.config().symbol.clone();
            let result = data::load_multi_timeframe(
                &config.replay.data_dir,
                &symbol,
                &config.session.timeframe,
                &aux_timeframes,
                config.replay.layout,
            )
            .map(|candles| run_replay(&mut session, &candles, &settings));
            pb.inc(1);
            pb.set_message(symbol.to_string());
            (symbol, result)
        })
        .collect();

    pb.finish_and_clear();

    let mut reports = Vec::with_capacity(results.len());
    for (symbol, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => error!(symbol = %symbol, "Replay failed: {:#}", e),
        }
    }
    reports.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports);
    }

    info!("Replay completed: {} of {} symbols", reports.len(), symbols.len());
    Ok(())
}

fn print_summary(reports: &[ReplayReport]) {
    println!("\n{}", "=".repeat(88));
    println!("REPLAY RESULTS");
    println!("{}", "=".repeat(88));
    println!(
        "{:<14} {:>8} {:>8} {:>8} {:>8} {:>12} {:>9} | Exits",
        "Symbol", "Candles", "Entries", "Trades", "WinR%", "PnL", "Return%"
    );
    println!("{}", "-".repeat(88));

    for report in reports {
        let mut exits: Vec<String> = report
            .exits_by_reason()
            .into_iter()
            .map(|(reason, count)| format!("{reason:?}:{count}"))
            .collect();
        exits.sort();

        println!(
            "{:<14} {:>8} {:>8} {:>8} {:>8.2} {:>12.2} {:>9.2} | {}",
            report.symbol.as_str(),
            report.candles,
            report.entries_submitted,
            report.trades.len(),
            report.win_rate(),
            report.total_pnl(),
            report.return_pct(),
            exits.join(" ")
        );
    }
    println!("{}", "=".repeat(88));
}
