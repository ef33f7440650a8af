use serde::{Deserialize, Serialize};

/// Index of a team inside the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub usize);

impl TeamId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a group inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub usize);

/// How comfortable a side is with tournament conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Familiarity {
    Home,
    #[default]
    Neutral,
    Away,
}

impl Familiarity {
    /// Sign applied to the familiarity bonus.
    pub fn sign(self) -> f64 {
        match self {
            Familiarity::Home => 1.0,
            Familiarity::Neutral => 0.0,
            Familiarity::Away => -1.0,
        }
    }
}

/// Surface character. Spin and pace pitches reward the stronger attack of
/// the matching style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pitch {
    Spin,
    Pace,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    #[serde(default)]
    pub pitch: Pitch,
}

impl Venue {
    pub fn new(name: impl Into<String>, pitch: Pitch) -> Self {
        Self {
            name: name.into(),
            pitch,
        }
    }
}

/// Team attributes as they appear in a roster document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub name: String,
    /// Elo-style strength, higher is stronger
    pub rating: f64,
    /// Official ranking, 1 is best
    pub rank: u32,
    /// Share of the last ten matches won (0.0–1.0)
    pub form: f64,
    /// Average first-innings total
    pub avg_runs_scored: f64,
    /// Average total conceded
    pub avg_runs_conceded: f64,
    /// Strength of the key players (0.0–1.0)
    pub squad_quality: f64,
    /// Spin attack strength (0.0–1.0)
    pub spin_strength: f64,
    /// Pace attack strength (0.0–1.0)
    pub pace_strength: f64,
    #[serde(default)]
    pub familiarity: Familiarity,
}

/// A validated team. Never mutated once the registry is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub id: TeamId,
    pub group: GroupId,
    pub name: String,
    pub rating: f64,
    pub rank: u32,
    pub form: f64,
    pub avg_runs_scored: f64,
    pub avg_runs_conceded: f64,
    pub squad_quality: f64,
    pub spin_strength: f64,
    pub pace_strength: f64,
    pub familiarity: Familiarity,
}

impl Team {
    pub(crate) fn from_record(id: TeamId, group: GroupId, record: TeamRecord) -> Self {
        Self {
            id,
            group,
            name: record.name,
            rating: record.rating,
            rank: record.rank,
            form: record.form,
            avg_runs_scored: record.avg_runs_scored,
            avg_runs_conceded: record.avg_runs_conceded,
            squad_quality: record.squad_quality,
            spin_strength: record.spin_strength,
            pace_strength: record.pace_strength,
            familiarity: record.familiarity,
        }
    }
}

/// Group as declared in a roster document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub venue: Venue,
    pub teams: Vec<String>,
}

/// A first-round group with resolved members, in roster order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub venue: Venue,
    pub members: Vec<TeamId>,
}

/// Reference to a group finishing position, e.g. `A1` for the winner of
/// group A.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub group: String,
    /// 1-based finishing position
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    pub venue: Venue,
    pub slots: Vec<Slot>,
}

/// Structural parameters of the tournament as written in the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub qualifiers_per_group: usize,
    pub pools: Vec<PoolSpec>,
    pub qualifiers_per_pool: usize,
    pub knockout_venue: Venue,
    pub final_venue: Venue,
}

/// Complete roster document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub teams: Vec<TeamRecord>,
    pub groups: Vec<GroupSpec>,
    pub format: FormatSpec,
}
