//! Schema command implementation

use anyhow::Result;
use trend_signal_engine::StrategyParams;

/// Print the declared hyperparameters as JSON
pub fn run() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(StrategyParams::schema())?);
    Ok(())
}
