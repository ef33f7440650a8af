//! Stage resolvers: group round robins, the secondary pools and the
//! knockout bracket.

use rand::Rng;
use serde::Serialize;

use super::match_model::{MatchModel, MatchResult};
use super::standings::{Standing, Table};
use crate::error::SimulationError;
use crate::registry::{TeamId, TeamRegistry, Venue};

/// Every pair plays once, in entry order (i < j). Returns the ranked table.
pub fn round_robin<R: Rng + ?Sized>(
    model: &MatchModel,
    registry: &TeamRegistry,
    teams: &[TeamId],
    venue: &Venue,
    rng: &mut R,
) -> Result<Vec<Standing>, SimulationError> {
    let mut table = Table::new(teams);
    for (i, &a) in teams.iter().enumerate() {
        for &b in &teams[i + 1..] {
            let result = model.play(registry.team(a), registry.team(b), venue, rng)?;
            table.record(result);
        }
    }
    Ok(table.ranked())
}

/// Ranked standings for every first-round group, in registry group order.
pub fn play_group_stage<R: Rng + ?Sized>(
    model: &MatchModel,
    registry: &TeamRegistry,
    rng: &mut R,
) -> Result<Vec<Vec<Standing>>, SimulationError> {
    registry
        .groups()
        .iter()
        .map(|group| round_robin(model, registry, &group.members, &group.venue, rng))
        .collect()
}

/// Fill each pool from the group finishing positions and play it out.
pub fn play_secondary_stage<R: Rng + ?Sized>(
    model: &MatchModel,
    registry: &TeamRegistry,
    group_standings: &[Vec<Standing>],
    rng: &mut R,
) -> Result<Vec<Vec<Standing>>, SimulationError> {
    let format = registry.format();
    format
        .pools
        .iter()
        .map(|pool| {
            let entrants = pool
                .slots
                .iter()
                .map(|&(group, position)| {
                    group_standings
                        .get(group.0)
                        .and_then(|table| table.get(position - 1))
                        .map(|s| s.team)
                        .ok_or_else(|| {
                            SimulationError::Invariant(format!(
                                "pool `{}` slot {}{} has no team",
                                pool.name,
                                registry.group(group).name,
                                position
                            ))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            round_robin(model, registry, &entrants, &pool.venue, rng)
        })
        .collect()
}

/// Seeds the knockout: pool winners first, then runners-up, earlier pools
/// ahead of later ones. The result is in bracket order, so the highest seed
/// meets the lowest.
pub fn seed_knockout(
    pool_standings: &[Vec<Standing>],
    qualifiers_per_pool: usize,
) -> Result<Vec<TeamId>, SimulationError> {
    let mut seeds = Vec::with_capacity(pool_standings.len() * qualifiers_per_pool);
    for position in 0..qualifiers_per_pool {
        for (p, table) in pool_standings.iter().enumerate() {
            let standing = table.get(position).ok_or_else(|| {
                SimulationError::Invariant(format!(
                    "pool {} has fewer than {} teams",
                    p,
                    position + 1
                ))
            })?;
            seeds.push(standing.team);
        }
    }

    let n = seeds.len();
    let mut bracket = Vec::with_capacity(n);
    for i in 0..n / 2 {
        bracket.push(seeds[i]);
        bracket.push(seeds[n - 1 - i]);
    }
    Ok(bracket)
}

/// Single-elimination results, one entry per round.
#[derive(Debug, Clone, Serialize)]
pub struct Bracket {
    pub rounds: Vec<Vec<MatchResult>>,
    pub champion: TeamId,
}

impl Bracket {
    /// The two teams of the last round.
    pub fn finalists(&self) -> Option<[TeamId; 2]> {
        match self.rounds.last().map(Vec::as_slice) {
            Some([last]) => Some([last.team_a, last.team_b]),
            _ => None,
        }
    }
}

/// Plays adjacent pairs each round until one team is left. The last round
/// is played at `final_venue`.
pub fn play_knockout<R: Rng + ?Sized>(
    model: &MatchModel,
    registry: &TeamRegistry,
    entrants: &[TeamId],
    venue: &Venue,
    final_venue: &Venue,
    rng: &mut R,
) -> Result<Bracket, SimulationError> {
    if entrants.len() < 2 || !entrants.len().is_power_of_two() {
        return Err(SimulationError::Invariant(format!(
            "knockout needs a power-of-two field, got {} teams",
            entrants.len()
        )));
    }

    let mut alive = entrants.to_vec();
    let mut rounds = Vec::new();
    while alive.len() > 1 {
        let venue = if alive.len() == 2 { final_venue } else { venue };
        let mut results = Vec::with_capacity(alive.len() / 2);
        for pair in alive.chunks_exact(2) {
            let result = model.play(registry.team(pair[0]), registry.team(pair[1]), venue, rng)?;
            results.push(result);
        }
        alive = results.iter().map(|r| r.winner).collect();
        rounds.push(results);
    }

    Ok(Bracket {
        rounds,
        champion: alive[0],
    })
}
