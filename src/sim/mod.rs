pub mod match_model;
pub mod monte_carlo;
pub mod stages;
pub mod standings;
pub mod tournament;

pub use match_model::{BlendWeights, DecisionPolicy, MatchModel, MatchResult, ModelParams};
pub use monte_carlo::{
    MonteCarlo, ProbabilityTable, RunOptions, Stage, StageCounts, StageProbabilities, Tally,
    TeamProbabilities, DEFAULT_ITERATIONS,
};
pub use tournament::{RunResult, Tournament};
