use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use neatrade::application::simulation::population::{AgentEvaluation, PopulationEvaluator, ranking};
use neatrade::application::simulation::replay::Replay;
use neatrade::config::Config;
use neatrade::domain::market::candle::{Candle, CandlesData};
use neatrade::domain::market::timeframe::Timeframe;
use neatrade::domain::ports::DecisionSource;
use neatrade::infrastructure::conversion_rates::FixedConversionRate;
use neatrade::infrastructure::random_decisions::RandomDecisionSource;
use std::sync::Arc;

const SAMPLE: &str = include_str!("../config/eurusd_h1.toml");
// 2024-01-01 00:00 UTC
const START: i64 = 1_704_067_200;
const DAYS: i64 = 30;

fn price_at(date: i64) -> f64 {
    let hours = (date - START) as f64 / 3600.0;
    1.1 + 0.004 * (hours / 9.0).sin() + 0.002 * (hours / 31.0).cos()
}

fn candles(timeframe: Timeframe) -> Vec<Candle> {
    let seconds = timeframe.to_seconds();
    (1..=DAYS * 86_400 / seconds)
        .map(|i| {
            let date = START + i * seconds;
            let open = Decimal::from_f64(price_at(date - seconds)).unwrap().round_dp(5);
            let close = Decimal::from_f64(price_at(date)).unwrap().round_dp(5);
            Candle {
                date,
                open,
                high: open.max(close) + dec!(0.0004),
                low: open.min(close) - dec!(0.0004),
                close,
                tick_volume: dec!(100),
                volume: dec!(0),
                spread: dec!(10),
            }
        })
        .collect()
}

fn setup(num_threads: Option<usize>) -> (Arc<Config>, Arc<Replay>) {
    let mut config = Config::from_toml_str(SAMPLE).unwrap();
    config.neuroevolution.num_threads = num_threads;
    let mut series = CandlesData::new();
    series.insert(Timeframe::OneHour, candles(Timeframe::OneHour));
    series.insert(Timeframe::FourHour, candles(Timeframe::FourHour));

    let replay = Replay::new(
        &config,
        series,
        &FixedConversionRate::identity(),
        START,
        START + DAYS * 86_400,
    )
    .unwrap();
    (Arc::new(config), Arc::new(replay))
}

fn agents(count: u64) -> Vec<Box<dyn DecisionSource>> {
    (0..count)
        .map(|seed| Box::new(RandomDecisionSource::new(seed, 3)) as Box<dyn DecisionSource>)
        .collect()
}

fn fitnesses(evaluations: &[AgentEvaluation]) -> Vec<f64> {
    evaluations.iter().map(|e| e.fitness).collect()
}

#[test]
fn test_population_evaluation_is_reproducible() {
    let (config, replay) = setup(None);
    assert!(!replay.is_empty());
    let evaluator = PopulationEvaluator::new(config, replay.clone());

    let first = evaluator.evaluate(agents(8)).unwrap();
    let second = evaluator.evaluate(agents(8)).unwrap();

    assert_eq!(first.len(), 8);
    assert_eq!(fitnesses(&first), fitnesses(&second));
    for (index, evaluation) in first.iter().enumerate() {
        assert_eq!(evaluation.index, index);
        let result = evaluation.result.as_ref().unwrap();
        assert!(result.steps <= replay.len());
        assert!(evaluation.fitness >= 0.0);
        assert!(result.trades.iter().all(|t| t.closed && t.exit_date >= t.entry_date));
    }
}

#[test]
fn test_dedicated_pool_matches_global_pool() {
    let (config, replay) = setup(None);
    let global = PopulationEvaluator::new(config, replay).evaluate(agents(6)).unwrap();

    let (config, replay) = setup(Some(2));
    let pooled = PopulationEvaluator::new(config, replay).evaluate(agents(6)).unwrap();

    assert_eq!(fitnesses(&global), fitnesses(&pooled));
}

#[test]
fn test_realized_balance_matches_trade_history() {
    let (config, replay) = setup(None);
    let evaluations = PopulationEvaluator::new(config.clone(), replay)
        .evaluate(agents(4))
        .unwrap();

    for evaluation in &evaluations {
        let result = evaluation.result.as_ref().unwrap();
        let realized: Decimal = result.trades.iter().map(|t| t.pnl - t.fees).sum();
        assert_eq!(
            result.report.statistics.final_balance,
            config.general.initial_balance + realized
        );
        assert!(
            result
                .trades
                .iter()
                .all(|t| config.strategy.maximum_trade_duration.is_none_or(|max| t.duration <= max as i64))
        );
    }

    let order = ranking(&evaluations);
    assert!(order.windows(2).all(|w| evaluations[w[0]].score >= evaluations[w[1]].score));
}
