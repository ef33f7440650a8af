use rand::Rng;
use serde::Serialize;

use super::match_model::MatchModel;
use super::stages::{play_group_stage, play_knockout, play_secondary_stage, seed_knockout};
use super::standings::Standing;
use crate::error::SimulationError;
use crate::registry::{TeamId, TeamRegistry};

/// Everything one simulated tournament produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Ranked table per first-round group
    pub group_standings: Vec<Vec<Standing>>,
    pub group_winners: Vec<TeamId>,
    pub group_runners_up: Vec<TeamId>,
    pub group_qualifiers: Vec<TeamId>,
    /// Ranked table per secondary pool
    pub pool_standings: Vec<Vec<Standing>>,
    pub secondary_qualifiers: Vec<TeamId>,
    /// Knockout entrants in bracket order
    pub semi_finalists: Vec<TeamId>,
    pub finalists: [TeamId; 2],
    pub champion: TeamId,
}

/// Plays a full tournament: groups, secondary pools, semi-finals, final.
pub struct Tournament<'a> {
    registry: &'a TeamRegistry,
    model: &'a MatchModel,
}

impl<'a> Tournament<'a> {
    pub fn new(registry: &'a TeamRegistry, model: &'a MatchModel) -> Self {
        Self { registry, model }
    }

    pub fn play<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RunResult, SimulationError> {
        let format = self.registry.format();

        let group_standings = play_group_stage(self.model, self.registry, rng)?;
        let group_winners = group_standings.iter().map(|t| t[0].team).collect();
        let group_runners_up = group_standings.iter().map(|t| t[1].team).collect();
        let group_qualifiers = top(&group_standings, format.qualifiers_per_group);

        let pool_standings = play_secondary_stage(self.model, self.registry, &group_standings, rng)?;
        let secondary_qualifiers = top(&pool_standings, format.qualifiers_per_pool);

        let semi_finalists = seed_knockout(&pool_standings, format.qualifiers_per_pool)?;
        let bracket = play_knockout(
            self.model,
            self.registry,
            &semi_finalists,
            &format.knockout_venue,
            &format.final_venue,
            rng,
        )?;
        if bracket.rounds.len() != 2 {
            return Err(SimulationError::Invariant(format!(
                "expected semi-finals and a final, got {} knockout rounds",
                bracket.rounds.len()
            )));
        }
        let finalists = bracket.finalists().ok_or_else(|| {
            SimulationError::Invariant("knockout did not end in a single final".into())
        })?;

        Ok(RunResult {
            group_standings,
            group_winners,
            group_runners_up,
            group_qualifiers,
            pool_standings,
            secondary_qualifiers,
            semi_finalists,
            finalists,
            champion: bracket.champion,
        })
    }
}

fn top(tables: &[Vec<Standing>], k: usize) -> Vec<TeamId> {
    tables
        .iter()
        .flat_map(|t| t.iter().take(k).map(|s| s.team))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::uniform_registry;
    use crate::sim::match_model::ModelParams;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn one_tournament_has_consistent_stages() {
        let registry = TeamRegistry::builtin().expect("builtin roster");
        let model = MatchModel::new(ModelParams::default()).expect("params");
        let mut rng = ChaCha8Rng::seed_from_u64(2026);
        let run = Tournament::new(&registry, &model).play(&mut rng).expect("run");

        assert_eq!(run.group_winners.len(), 4);
        assert_eq!(run.group_runners_up.len(), 4);
        assert_eq!(run.group_qualifiers.len(), 8);
        assert_eq!(run.secondary_qualifiers.len(), 4);
        assert_eq!(run.semi_finalists.len(), 4);
        for (w, r) in run.group_winners.iter().zip(&run.group_runners_up) {
            assert_ne!(w, r);
            assert!(run.group_qualifiers.contains(w));
            assert!(run.group_qualifiers.contains(r));
        }
        for t in &run.secondary_qualifiers {
            assert!(run.group_qualifiers.contains(t));
            assert!(run.semi_finalists.contains(t));
        }
        for f in &run.finalists {
            assert!(run.semi_finalists.contains(f));
        }
        assert!(run.finalists.contains(&run.champion));
    }

    #[test]
    fn same_rng_state_replays_identically() {
        let registry = uniform_registry();
        let model = MatchModel::new(ModelParams::default()).expect("params");
        let tournament = Tournament::new(&registry, &model);
        let play = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let run = tournament.play(&mut rng).expect("run");
            (run.group_qualifiers, run.semi_finalists, run.champion)
        };
        assert_eq!(play(99), play(99));
    }
}
