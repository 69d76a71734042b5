//! Integration tests for the trend signal engine
//!
//! These tests verify that all components work together correctly.

use chrono::{DateTime, Duration, TimeZone, Utc};

use trend_signal_engine::market_state::{MarketStateClassifier, Trend};
use trend_signal_engine::multi_timeframe::MultiTimeframeData;
use trend_signal_engine::params::StrategyParams;
use trend_signal_engine::policy::{StrategyPolicy, TrendCheck};
use trend_signal_engine::replay::{run_replay, ReplaySettings};
use trend_signal_engine::risk::RiskManager;
use trend_signal_engine::session::{SessionConfig, SessionState};
use trend_signal_engine::signals::SignalGenerator;
use trend_signal_engine::{
    data, Candle, CandleLayout, Config, Hyperparameters, IndicatorSnapshot, MarketView,
    OrderIntent, OrderSink, PositionView, PresetBook, Side, Signal, StrategySession, Symbol,
};

// =============================================================================
// Test Utilities
// =============================================================================

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Generate mock candle data for testing
fn generate_mock_candles(count: usize, base_price: f64, volatility: f64) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(count);
    let mut price = base_price;

    for i in 0..count {
        // Deterministic zig-zag with a slow oscillation on top
        let change = if i % 3 == 0 {
            volatility
        } else if i % 3 == 1 {
            -volatility * 0.5
        } else {
            volatility * 0.3
        } + (i as f64 / 15.0).sin() * volatility;

        price = (price + change).max(1.0);
        let open = price - change * 0.3;
        let high = price.max(open) + volatility * 0.5;
        let low = (price.min(open) - volatility * 0.5).max(0.5);

        candles.push(Candle::new_unchecked(
            start_time() + Duration::hours(i as i64),
            open,
            high,
            low,
            price,
            1000.0 + (i as f64 * 10.0),
        ));
    }

    candles
}

/// Generate trending candle data
fn generate_trending_candles(count: usize, base_price: f64, trend_strength: f64) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(count);

    for i in 0..count {
        let price = base_price + (i as f64 * trend_strength);
        let volatility = base_price * 0.02;

        candles.push(Candle::new_unchecked(
            start_time() + Duration::hours(i as i64),
            price - volatility * 0.5,
            price + volatility,
            price - volatility,
            price + volatility * 0.3,
            1000.0 + (i as f64 * 10.0),
        ));
    }

    candles
}

fn session_config() -> SessionConfig {
    SessionConfig {
        exchange: "binance".to_string(),
        symbol: Symbol::new("BTC-USDT"),
        timeframe: "1h".to_string(),
    }
}

fn hyperparameters(pairs: &[(&str, f64)]) -> Hyperparameters {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
        .collect()
}

/// Minimal host: a growing candle window, fixed capital, recorded intents
struct TestHost {
    candles: Vec<Candle>,
    len: usize,
    capital: f64,
    position: Option<PositionView>,
    intents: Vec<OrderIntent>,
}

impl TestHost {
    fn new(candles: Vec<Candle>, capital: f64) -> Self {
        Self {
            candles,
            len: 0,
            capital,
            position: None,
            intents: Vec::new(),
        }
    }
}

impl MarketView for TestHost {
    fn current_window(&self, _symbol: &Symbol, _timeframe: &str) -> &[Candle] {
        &self.candles[..self.len]
    }

    fn candles(&self, _exchange: &str, _symbol: &Symbol, _timeframe: &str) -> Option<&[Candle]> {
        None
    }

    fn available_capital(&self) -> f64 {
        self.capital
    }

    fn balance(&self) -> f64 {
        self.capital
    }

    fn position(&self, _symbol: &Symbol) -> Option<PositionView> {
        self.position
    }
}

impl OrderSink for TestHost {
    fn submit(&mut self, intent: OrderIntent) {
        self.intents.push(intent);
    }
}

// =============================================================================
// Behavioural Scenarios
// =============================================================================

#[test]
fn test_sideways_market_blocks_entries() {
    let params = StrategyParams::resolve(&hyperparameters(&[("bb_width_threshold", 0.01)])).unwrap();
    let policy = StrategyPolicy {
        allow_short: true,
        ..StrategyPolicy::default()
    };

    let snap = IndicatorSnapshot {
        close: Some(100.0),
        prev_close: Some(101.0),
        adx: Some(15.0),
        prev_adx: Some(14.0),
        bb_upper: Some(100.25),
        bb_middle: Some(100.0),
        bb_lower: Some(99.75),
        bb_width: Some(0.005),
        prev_bb_width: Some(0.006),
        rsi: Some(40.0),
        rsi_sma: Some(50.0),
        sma_trend: Some(99.0),
        len: 24,
        ..IndicatorSnapshot::default()
    };

    let classifier = MarketStateClassifier::new(&params, &policy);
    let signals = SignalGenerator::new(&params, &policy);
    let state = classifier.classify(&snap);

    assert!(state.is_sideways);
    assert!(!signals.should_long(&snap, &state));
    assert!(!signals.should_short(&snap, &state));
    assert_eq!(signals.entry_signal(&snap, &state), Signal::Flat);
}

#[test]
fn test_pullback_in_uptrend_triggers_long_below_midline() {
    let params = StrategyParams::default();
    let policy = StrategyPolicy {
        allow_short: true,
        ..StrategyPolicy::default()
    };

    // Strong ADX and above the trend SMA, but under the band midline after a
    // down candle: both quorums are met and the long side is taken
    let snap = IndicatorSnapshot {
        close: Some(100.0),
        prev_close: Some(100.5),
        sma_trend: Some(98.0),
        adx: Some(30.0),
        prev_adx: Some(28.0),
        bb_upper: Some(105.0),
        bb_middle: Some(101.0),
        bb_lower: Some(97.0),
        bb_width: Some(0.08),
        prev_bb_width: Some(0.07),
        rsi: Some(45.0),
        rsi_sma: Some(50.0),
        len: 100,
        ..IndicatorSnapshot::default()
    };

    let classifier = MarketStateClassifier::new(&params, &policy);
    let signals = SignalGenerator::new(&params, &policy);
    let state = classifier.classify(&snap);

    assert!(!state.is_sideways);
    assert!(state.uptrend);
    assert!(state.downtrend);
    assert_eq!(state.trend, Trend::Neutral);
    assert!(signals.should_long(&snap, &state));
    assert!(!signals.should_short(&snap, &state));
    assert_eq!(signals.entry_signal(&snap, &state), Signal::Long);
}

#[test]
fn test_rising_adx_quorum_with_three_checks() {
    let params = StrategyParams::resolve(&hyperparameters(&[("trend_quorum", 3.0)])).unwrap();
    let policy = StrategyPolicy {
        trend_checks: vec![
            TrendCheck::PriceVsSma,
            TrendCheck::AdxRising,
            TrendCheck::PriceVsBandMiddle,
            TrendCheck::PriceMomentum,
        ],
        ..StrategyPolicy::default()
    };
    let classifier = MarketStateClassifier::new(&params, &policy);

    let mut snap = IndicatorSnapshot {
        close: Some(100.0),
        prev_close: Some(99.0),
        sma_trend: Some(98.0),
        adx: Some(30.0),
        prev_adx: Some(27.0),
        bb_middle: Some(101.0),
        bb_width: Some(0.08),
        prev_bb_width: Some(0.07),
        len: 100,
        ..IndicatorSnapshot::default()
    };
    assert_eq!(classifier.quorums(&snap), (true, false));

    // Falling ADX leaves only two up votes
    snap.prev_adx = Some(32.0);
    assert_eq!(classifier.quorums(&snap), (false, false));
}

#[test]
fn test_atr_stop_and_short_window_fallback() {
    let params = StrategyParams::default();
    let risk = RiskManager::from_params(&params);

    let levels = risk.protective_levels(Side::Buy, 2000.0, Some(50.0));
    assert!((levels.stop_loss - 1900.0).abs() < 1e-9);

    // Fewer candles than the ATR period: no ATR, price-fraction estimate
    let candles = generate_trending_candles(5, 2000.0, 5.0);
    let snap = IndicatorSnapshot::compute(&candles, None, &params);
    assert_eq!(snap.atr, None);

    let close = snap.close.unwrap();
    let distance = risk.stop_distance(snap.atr, close);
    assert!(distance > 0.0);
    assert!(distance <= close * params.max_stop_fraction + 1e-9);

    let levels = risk.protective_levels(Side::Buy, close, snap.atr);
    assert!(levels.stop_loss < close);
    assert!(levels.take_profit > close);
}

#[test]
fn test_insufficient_capital_submits_nothing() {
    let params = StrategyParams::default();
    let risk = RiskManager::from_params(&params);
    assert_eq!(risk.size(5.0, 100.0, 2000.0), 0.0);

    let candles = generate_mock_candles(200, 100.0, 1.5);
    let mut session = StrategySession::new(
        session_config(),
        params,
        StrategyPolicy::band_reversion(),
    )
    .unwrap();
    let mut host = TestHost::new(candles, 5.0);

    for len in 1..=host.candles.len() {
        host.len = len;
        session.step(&mut host);
    }

    assert!(!host
        .intents
        .iter()
        .any(|i| matches!(i, OrderIntent::SubmitEntry { .. })));
    assert_eq!(session.state(), SessionState::Idle);
}

// =============================================================================
// Invariants
// =============================================================================

#[test]
fn test_long_and_short_never_both_true() {
    let params = StrategyParams::default();
    let candles = generate_mock_candles(400, 100.0, 2.0);

    for policy in [
        StrategyPolicy {
            allow_short: true,
            counter_trend_fallback: true,
            ..StrategyPolicy::default()
        },
        StrategyPolicy::trend_follow("4h"),
    ] {
        let classifier = MarketStateClassifier::new(&params, &policy);
        let signals = SignalGenerator::new(&params, &policy);

        for end in 1..=candles.len() {
            let snap = IndicatorSnapshot::compute(&candles[..end], None, &params);
            let state = classifier.classify(&snap);
            assert!(
                !(signals.should_long(&snap, &state) && signals.should_short(&snap, &state)),
                "both directions signalled at candle {end}"
            );
        }
    }
}

#[test]
fn test_short_window_is_sideways() {
    let params = StrategyParams::default();
    let policy = StrategyPolicy::default();
    let classifier = MarketStateClassifier::new(&params, &policy);

    let candles = generate_trending_candles(24, 100.0, 2.0);
    let snap = IndicatorSnapshot::compute(&candles, None, &params);
    let state = classifier.classify(&snap);

    assert!(state.is_sideways);
    assert_eq!(snap.len, 24);
}

#[test]
fn test_evaluation_is_idempotent() {
    let candles = generate_mock_candles(150, 100.0, 1.5);
    let session = StrategySession::new(
        session_config(),
        StrategyParams::default(),
        StrategyPolicy::band_reversion(),
    )
    .unwrap();
    let mut host = TestHost::new(candles, 10_000.0);
    host.len = host.candles.len();

    let first = session.evaluate(&host);
    let second = session.evaluate(&host);
    assert_eq!(first, second);
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn test_position_lifecycle_with_host() {
    let candles = generate_mock_candles(150, 100.0, 1.5);
    let mut session = StrategySession::new(
        session_config(),
        StrategyParams::default(),
        StrategyPolicy::default(),
    )
    .unwrap();
    let mut host = TestHost::new(candles, 10_000.0);
    host.len = host.candles.len();

    let fill = trend_signal_engine::Fill {
        side: Side::Buy,
        price: 100.0,
        quantity: 2.0,
    };
    let intents = session.on_open_position(&fill, &host);
    assert_eq!(intents.len(), 2);
    assert!(matches!(
        session.state(),
        SessionState::PositionOpen { entry_price, .. } if entry_price == 100.0
    ));

    // Host lost the position: the session goes back to idle on the next candle
    host.position = None;
    session.step(&mut host);
    assert!(!matches!(session.state(), SessionState::PositionOpen { .. }));

    session.on_close_position();
    assert_eq!(session.state(), SessionState::Idle);
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_replay_end_to_end() {
    let mut data = MultiTimeframeData::new("1h");
    data.add_timeframe("1h", generate_mock_candles(600, 100.0, 2.0));

    let mut session = StrategySession::new(
        session_config(),
        StrategyParams::default(),
        StrategyPolicy {
            allow_short: true,
            counter_trend_fallback: true,
            ..StrategyPolicy::default()
        },
    )
    .unwrap();
    let settings = ReplaySettings::default();

    let report = run_replay(&mut session, &data, &settings);

    assert_eq!(report.candles, 600);
    assert!(report.entries_submitted >= report.trades.len());
    assert!((report.final_balance - (report.initial_capital + report.total_pnl())).abs() < 1e-6);
    for trade in &report.trades {
        assert!(trade.quantity > 0.0);
        assert!(trade.exit_time >= trade.entry_time);
    }
    assert!(!matches!(session.state(), SessionState::PositionOpen { .. }));
    assert!(session.last_decision().is_some());
}

#[test]
fn test_trend_follow_replay_with_higher_timeframe() {
    let mut data = MultiTimeframeData::new("1h");
    data.add_timeframe("1h", generate_mock_candles(600, 100.0, 2.0));
    let four_hourly: Vec<Candle> = generate_mock_candles(600, 100.0, 2.0)
        .chunks(4)
        .map(|chunk| {
            let first = &chunk[0];
            let last = &chunk[chunk.len() - 1];
            Candle::new_unchecked(
                first.datetime,
                first.open,
                chunk.iter().map(|c| c.high).fold(f64::MIN, f64::max),
                chunk.iter().map(|c| c.low).fold(f64::MAX, f64::min),
                last.close,
                chunk.iter().map(|c| c.volume).sum(),
            )
        })
        .collect();
    data.add_timeframe("4h", four_hourly);

    let mut session = StrategySession::new(
        session_config(),
        StrategyParams::default(),
        StrategyPolicy::trend_follow("4h"),
    )
    .unwrap();
    let report = run_replay(&mut session, &data, &ReplaySettings::default());

    assert_eq!(report.candles, 600);
    assert!((report.final_balance - (report.initial_capital + report.total_pnl())).abs() < 1e-6);
    assert!(report.entries_submitted >= report.trades.len());
    assert!(!matches!(session.state(), SessionState::PositionOpen { .. }));
}

#[test]
fn test_replay_from_csv_files() {
    let dir = std::env::temp_dir().join(format!("trend-signal-engine-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let mut contents = String::from("datetime,open,high,low,close,volume\n");
    for c in generate_trending_candles(120, 100.0, 0.5) {
        contents.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.datetime.format("%Y-%m-%d %H:%M:%S"),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    let symbol = Symbol::new("ETH-USDT");
    std::fs::write(data::candle_path(&dir, &symbol, "1h"), contents).unwrap();

    let loaded =
        data::load_multi_timeframe(&dir, &symbol, "1h", &["4h".to_string()], CandleLayout::Standard)
            .unwrap();
    assert_eq!(loaded.primary().len(), 120);
    assert!(!loaded.has_timeframe("4h"));

    let mut session = StrategySession::new(
        SessionConfig {
            symbol: symbol.clone(),
            ..session_config()
        },
        StrategyParams::default(),
        StrategyPolicy::default(),
    )
    .unwrap();
    let report = run_replay(&mut session, &loaded, &ReplaySettings::default());
    assert_eq!(report.symbol, symbol);
    assert_eq!(report.candles, 120);

    std::fs::remove_dir_all(&dir).ok();
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_file_with_presets() {
    let mut presets = PresetBook::new();
    presets.insert(
        &Symbol::new("BTC-USDT"),
        &hyperparameters(&[("adx_threshold", 35.0), ("rsi_period", 10.0)]),
    );

    let config = serde_json::json!({
        "session": { "exchange": "binance", "timeframe": "1h" },
        "hyperparameters": { "adx_threshold": 25, "bb_period": 18 },
        "presets": presets,
        "replay": { "symbols": ["BTC-USDT", "ETH-USDT"] }
    });

    let dir = std::env::temp_dir().join(format!("trend-signal-engine-cfg-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.symbols().len(), 2);

    // Preset wins over the file-level overrides
    let btc = config.build_session(&Symbol::new("BTC-USDT")).unwrap();
    assert_eq!(btc.params().adx_threshold, 35.0);
    assert_eq!(btc.params().rsi_period, 10);
    assert_eq!(btc.params().bb_period, 18);

    // No preset: file-level overrides over defaults
    let eth = config.build_session(&Symbol::new("ETH-USDT")).unwrap();
    assert_eq!(eth.params().adx_threshold, 25.0);
    assert_eq!(eth.params().rsi_period, 12);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_inconsistent_policy_is_rejected() {
    let result = StrategySession::new(
        session_config(),
        StrategyParams::default(),
        StrategyPolicy {
            trend_checks: vec![TrendCheck::HigherTimeframe, TrendCheck::PriceVsSma],
            higher_timeframe: None,
            ..StrategyPolicy::default()
        },
    );
    assert!(result.is_err());
}

#[test]
fn test_shipped_default_config_builds() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/default.json");
    let config = Config::from_file(path).unwrap();

    for symbol in config.symbols() {
        let session = config.build_session(&symbol).unwrap();
        assert_eq!(session.params().trend_quorum, 2);
    }
}
