//! Single-match outcome model.
//!
//! A match produces two signals: a blended pre-match win probability and a
//! pair of Poisson-drawn innings totals. [`DecisionPolicy`] picks which one
//! decides the winner; the other is kept consistent with it.
//!
//! Randomness is drawn from the caller's generator in a fixed order:
//! toss, batting-first bonus, score A, score B, then the decision draw
//! (always under `Blended`, only on a tie under `ScoreDraw`).

use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimulationError};
use crate::registry::{Pitch, Team, TeamId, Venue};

/// Win-probability shift per place of ranking difference.
const RANK_STEP: f64 = 0.02;

/// Tolerance for the blend weights summing to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ── Parameters ───────────────────────────────────────────────────────────────

/// Weights of the four sub-probabilities. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub rating: f64,
    pub form: f64,
    pub rank: f64,
    pub squad: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            rating: 0.35,
            form: 0.25,
            rank: 0.25,
            squad: 0.15,
        }
    }
}

impl BlendWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("rating", self.rating),
            ("form", self.form),
            ("rank", self.rank),
            ("squad", self.squad),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::WeightOutOfRange { field, value });
            }
        }
        let sum = self.rating + self.form + self.rank + self.squad;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

/// Which signal decides the winner of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPolicy {
    /// Bernoulli draw on the blended probability; scores are re-ordered to
    /// agree with it.
    #[default]
    Blended,
    /// Higher Poisson total wins; equal totals go to a super over.
    ScoreDraw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub weights: BlendWeights,
    /// League-average total that scales expected runs
    pub runs_baseline: f64,
    /// Probability shift for a home side (negated for an away side)
    pub familiarity_bonus: f64,
    /// Probability shift for the toss winner
    pub toss_bonus: f64,
    /// Final probabilities are clamped to [floor, 1 - floor]
    pub probability_floor: f64,
    /// Relative λ adjustment on a pitch that suits one attack
    pub pitch_factor: f64,
    /// Inclusive range of extra runs for the side batting first
    pub batting_first_bonus: (u32, u32),
    pub score_floor: u32,
    pub score_ceiling: u32,
    pub policy: DecisionPolicy,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            weights: BlendWeights::default(),
            runs_baseline: 160.0,
            familiarity_bonus: 0.04,
            toss_bonus: 0.015,
            probability_floor: 0.01,
            pitch_factor: 0.03,
            batting_first_bonus: (5, 8),
            score_floor: 100,
            score_ceiling: 250,
            policy: DecisionPolicy::Blended,
        }
    }
}

impl ModelParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;

        let invalid = |field: &'static str, reason: &str| ConfigError::ModelParam {
            field,
            reason: reason.to_string(),
        };
        if !self.runs_baseline.is_finite() || self.runs_baseline <= 0.0 {
            return Err(invalid("runs_baseline", "must be positive"));
        }
        if !(0.0..0.5).contains(&self.probability_floor) {
            return Err(invalid("probability_floor", "must lie in [0, 0.5)"));
        }
        for (field, value) in [
            ("familiarity_bonus", self.familiarity_bonus),
            ("toss_bonus", self.toss_bonus),
        ] {
            if !(0.0..=0.5).contains(&value) {
                return Err(invalid(field, "must lie in [0, 0.5]"));
            }
        }
        if !(0.0..1.0).contains(&self.pitch_factor) {
            return Err(invalid("pitch_factor", "must lie in [0, 1)"));
        }
        let (lo, hi) = self.batting_first_bonus;
        if lo > hi {
            return Err(invalid("batting_first_bonus", "lower bound exceeds upper bound"));
        }
        if self.score_floor > self.score_ceiling {
            return Err(invalid("score_floor", "exceeds score_ceiling"));
        }
        Ok(())
    }
}

// ── Match result ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub team_a: TeamId,
    pub team_b: TeamId,
    pub score_a: u32,
    pub score_b: u32,
    pub winner: TeamId,
    pub toss_winner: TeamId,
    /// Totals were level and the result came from the tiebreak draw
    pub super_over: bool,
}

impl MatchResult {
    pub fn loser(&self) -> TeamId {
        if self.winner == self.team_a {
            self.team_b
        } else {
            self.team_a
        }
    }

    /// (runs scored, runs conceded) from the point of view of `team`.
    pub fn runs_for(&self, team: TeamId) -> (u32, u32) {
        if team == self.team_a {
            (self.score_a, self.score_b)
        } else {
            (self.score_b, self.score_a)
        }
    }
}

// ── Model ────────────────────────────────────────────────────────────────────

/// Validated match model. Cheap to share across worker threads.
#[derive(Debug, Clone)]
pub struct MatchModel {
    params: ModelParams,
}

impl MatchModel {
    pub fn new(params: ModelParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Pre-match probability that `a` beats `b`, optionally with a known toss
    /// winner. Symmetric: `p(a, b) + p(b, a) == 1` when the clamp is inactive.
    pub fn win_probability(&self, a: &Team, b: &Team, toss_winner: Option<TeamId>) -> f64 {
        let w = &self.params.weights;
        let base = w.rating * rating_prob(a.rating, b.rating)
            + w.form * diff_prob(a.form, b.form)
            + w.rank * rank_prob(a.rank, b.rank)
            + w.squad * diff_prob(a.squad_quality, b.squad_quality);

        let mut shift =
            self.params.familiarity_bonus * (a.familiarity.sign() - b.familiarity.sign());
        match toss_winner {
            Some(id) if id == a.id => shift += self.params.toss_bonus,
            Some(id) if id == b.id => shift -= self.params.toss_bonus,
            _ => {}
        }

        let floor = self.params.probability_floor;
        (base + shift).clamp(floor, 1.0 - floor)
    }

    /// Expected totals (λ_a, λ_b) before the toss bonus. On a spin or pace
    /// pitch the stronger attack gains; equal attacks leave both unchanged.
    pub fn expected_runs(&self, a: &Team, b: &Team, venue: &Venue) -> (f64, f64) {
        let baseline = self.params.runs_baseline;
        let mut lambda_a = a.avg_runs_scored * (b.avg_runs_conceded / baseline);
        let mut lambda_b = b.avg_runs_scored * (a.avg_runs_conceded / baseline);

        let attacks = match venue.pitch {
            Pitch::Spin => Some((a.spin_strength, b.spin_strength)),
            Pitch::Pace => Some((a.pace_strength, b.pace_strength)),
            Pitch::Balanced => None,
        };
        if let Some((attack_a, attack_b)) = attacks {
            let up = 1.0 + self.params.pitch_factor;
            let down = 1.0 - self.params.pitch_factor;
            if attack_a > attack_b {
                lambda_a *= up;
                lambda_b *= down;
            } else if attack_b > attack_a {
                lambda_a *= down;
                lambda_b *= up;
            }
        }
        (lambda_a, lambda_b)
    }

    /// Play one match. Always produces a decisive winner.
    pub fn play<R: Rng + ?Sized>(
        &self,
        a: &Team,
        b: &Team,
        venue: &Venue,
        rng: &mut R,
    ) -> Result<MatchResult, SimulationError> {
        let toss_winner = if rng.gen_bool(0.5) { a.id } else { b.id };
        let (lo, hi) = self.params.batting_first_bonus;
        let bonus = rng.gen_range(lo..=hi) as f64;

        let (mut lambda_a, mut lambda_b) = self.expected_runs(a, b, venue);
        if toss_winner == a.id {
            lambda_a += bonus;
        } else {
            lambda_b += bonus;
        }

        let mut score_a = self.draw_score(lambda_a, rng)?;
        let mut score_b = self.draw_score(lambda_b, rng)?;
        let level = score_a == score_b;
        let p_a = self.win_probability(a, b, Some(toss_winner));

        let a_wins = match self.params.policy {
            DecisionPolicy::Blended => {
                let a_wins = rng.gen_bool(p_a);
                if a_wins != (score_a > score_b) && !level {
                    std::mem::swap(&mut score_a, &mut score_b);
                }
                a_wins
            }
            DecisionPolicy::ScoreDraw => {
                if level {
                    rng.gen_bool(p_a)
                } else {
                    score_a > score_b
                }
            }
        };

        // Super over: the winner's total is recorded one run higher.
        if level {
            if a_wins {
                score_a += 1;
            } else {
                score_b += 1;
            }
        }

        Ok(MatchResult {
            team_a: a.id,
            team_b: b.id,
            score_a,
            score_b,
            winner: if a_wins { a.id } else { b.id },
            toss_winner,
            super_over: level,
        })
    }

    fn draw_score<R: Rng + ?Sized>(&self, lambda: f64, rng: &mut R) -> Result<u32, SimulationError> {
        let poisson = Poisson::new(lambda).map_err(|_| SimulationError::ScoreSampler { lambda })?;
        let runs: f64 = poisson.sample(rng);
        Ok((runs as u32).clamp(self.params.score_floor, self.params.score_ceiling))
    }
}

// ── Sub-probabilities ────────────────────────────────────────────────────────

/// Elo expectation: `1 / (1 + 10^(-Δ/400))`.
fn rating_prob(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(-(rating_a - rating_b) / 400.0))
}

/// Centred difference of two [0, 1] attributes, stays in [0, 1].
fn diff_prob(a: f64, b: f64) -> f64 {
    0.5 + (a - b) / 2.0
}

/// Lower rank is better. Clamped because rank gaps are unbounded.
fn rank_prob(rank_a: u32, rank_b: u32) -> f64 {
    let diff = rank_b as f64 - rank_a as f64;
    (0.5 + diff * RANK_STEP).clamp(0.0, 1.0)
}
