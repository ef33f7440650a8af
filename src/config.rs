use std::path::PathBuf;

use clap::Parser;

use crate::error::ConfigError;
use crate::sim::{BlendWeights, DecisionPolicy, ModelParams, DEFAULT_ITERATIONS};

/// Monte Carlo simulator for T20 World Cup title probabilities
#[derive(Parser, Debug, Clone)]
#[command(name = "t20-sim", version, about)]
pub struct Config {
    /// Number of tournaments to simulate
    #[arg(short = 'n', long, env = "SIM_ITERATIONS", default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: u64,

    /// Random seed; a fixed seed reproduces every match exactly
    #[arg(long, env = "SIM_SEED")]
    pub seed: Option<u64>,

    /// Worker threads (0 = one per core, 1 = run inline)
    #[arg(long, env = "SIM_THREADS", default_value = "0")]
    pub threads: usize,

    /// Roster JSON file; the built-in 2026 field is used when omitted
    #[arg(long, env = "SIM_ROSTER")]
    pub roster: Option<PathBuf>,

    /// Write the probability table as JSON to this path
    #[arg(short, long, env = "SIM_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Weight of the rating-based win probability
    #[arg(long, env = "SIM_WEIGHT_RATING", default_value = "0.35")]
    pub weight_rating: f64,

    /// Weight of the recent-form win probability
    #[arg(long, env = "SIM_WEIGHT_FORM", default_value = "0.25")]
    pub weight_form: f64,

    /// Weight of the ranking-based win probability
    #[arg(long, env = "SIM_WEIGHT_RANK", default_value = "0.25")]
    pub weight_rank: f64,

    /// Weight of the squad-quality win probability
    #[arg(long, env = "SIM_WEIGHT_SQUAD", default_value = "0.15")]
    pub weight_squad: f64,

    /// Which signal decides a match winner
    #[arg(long, env = "SIM_POLICY", value_enum, default_value = "blended")]
    pub policy: DecisionPolicy,

    /// Stop after this many seconds and report the iterations done so far
    #[arg(long, env = "SIM_TIME_BUDGET_SECS")]
    pub time_budget_secs: Option<u64>,

    /// Rows shown in the championship ranking
    #[arg(long, env = "SIM_TOP", default_value = "10")]
    pub top: usize,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations(self.iterations));
        }
        self.weights().validate()?;
        if self.time_budget_secs == Some(0) {
            return Err(ConfigError::ZeroTimeBudget);
        }
        Ok(())
    }

    pub fn weights(&self) -> BlendWeights {
        BlendWeights {
            rating: self.weight_rating,
            form: self.weight_form,
            rank: self.weight_rank,
            squad: self.weight_squad,
        }
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            weights: self.weights(),
            policy: self.policy,
            ..ModelParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["t20-sim"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).expect("arguments parse")
    }

    #[test]
    fn defaults_match_the_published_model() {
        let config = parse(&[]);
        assert_eq!(config.iterations, 10_000);
        assert_eq!(config.seed, None);
        assert_eq!(config.weights(), BlendWeights::default());
        assert_eq!(config.policy, DecisionPolicy::Blended);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = parse(&["-n", "0"]);
        assert_eq!(config.validate(), Err(ConfigError::ZeroIterations(0)));
    }

    #[test]
    fn weights_not_summing_to_one_rejected() {
        let config = parse(&["--weight-rating", "0.5"]);
        assert!(matches!(config.validate(), Err(ConfigError::WeightSum { .. })));
    }

    #[test]
    fn zero_time_budget_rejected() {
        let config = parse(&["--time-budget-secs", "0"]);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeBudget));
        assert!(parse(&["--time-budget-secs", "30"]).validate().is_ok());
    }

    #[test]
    fn policy_and_seed_parse() {
        let config = parse(&["--policy", "score-draw", "--seed", "42"]);
        assert_eq!(config.policy, DecisionPolicy::ScoreDraw);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.model_params().policy, DecisionPolicy::ScoreDraw);
    }
}
