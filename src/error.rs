use thiserror::Error;

/// Invalid simulation settings. Raised before any match is played.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("iterations must be a positive integer, got {0}")]
    ZeroIterations(u64),

    #[error("blend weight `{field}` must lie in [0, 1], got {value}")]
    WeightOutOfRange { field: &'static str, value: f64 },

    #[error("blend weights must sum to 1.0, got {sum:.6}")]
    WeightSum { sum: f64 },

    #[error("time budget must be at least one second")]
    ZeroTimeBudget,

    #[error("model parameter `{field}` is invalid: {reason}")]
    ModelParam { field: &'static str, reason: String },

    #[error("tournament format `{field}` is invalid: {reason}")]
    Format { field: &'static str, reason: String },
}

/// Problems with the team roster. Raised while the registry is built.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read roster {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed roster: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("team `{team}`: `{field}` = {value} is outside its valid range")]
    OutOfRange {
        team: String,
        field: &'static str,
        value: f64,
    },

    #[error("team `{0}` is listed more than once")]
    DuplicateTeam(String),

    #[error("group `{group}` references unknown team `{team}`")]
    UnknownTeam { group: String, team: String },

    #[error("team `{0}` is not assigned to any group")]
    Unassigned(String),

    #[error("team `{team}` is assigned to both `{first}` and `{second}`")]
    MultipleGroups {
        team: String,
        first: String,
        second: String,
    },

    #[error("group `{0}` is declared more than once")]
    DuplicateGroup(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures while simulating. Every variant other than `NoCompletedIterations`
/// indicates a defect rather than bad input.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("no iterations completed before the run was stopped")]
    NoCompletedIterations,

    #[error("expected runs {lambda} rejected by the score sampler")]
    ScoreSampler { lambda: f64 },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
