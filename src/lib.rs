//! Monte Carlo estimation of T20 World Cup stage probabilities.
//!
//! [`registry`] holds the validated teams and tournament format, [`sim`] the
//! match model, stage resolvers and the Monte Carlo driver.

pub mod config;
pub mod error;
pub mod registry;
pub mod sim;

pub use error::{ConfigError, RegistryError, SimulationError};
pub use registry::{TeamId, TeamRegistry};
pub use sim::{MatchModel, ModelParams, MonteCarlo, ProbabilityTable, RunOptions};
