//! Monte Carlo driver.
//!
//! Iteration `i` draws from a ChaCha8 generator seeded with the run seed and
//! switched to stream `i`, so the table does not depend on how iterations are
//! spread over threads. Workers fold into private tallies that are summed at
//! the end.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::match_model::MatchModel;
use super::tournament::{RunResult, Tournament};
use crate::error::{ConfigError, SimulationError};
use crate::registry::{TeamRegistry, KNOCKOUT_ENTRANTS};

pub const DEFAULT_ITERATIONS: u64 = 10_000;

const PROGRESS_EVERY: u64 = 1_000;

/// Stages in the order a team reaches them. Each implies the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    GroupQualified,
    SecondaryQualified,
    SemiFinalist,
    Finalist,
    Champion,
}

impl Stage {
    pub const CHAIN: [Stage; 5] = [
        Stage::GroupQualified,
        Stage::SecondaryQualified,
        Stage::SemiFinalist,
        Stage::Finalist,
        Stage::Champion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::GroupQualified => "group_qualified",
            Stage::SecondaryQualified => "secondary_qualified",
            Stage::SemiFinalist => "semi_finalist",
            Stage::Finalist => "finalist",
            Stage::Champion => "champion",
        }
    }
}

/// Per-team counts of iterations reaching each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub group_winner: u64,
    pub group_runner_up: u64,
    pub group_qualified: u64,
    pub secondary_qualified: u64,
    pub semi_finalist: u64,
    pub finalist: u64,
    pub champion: u64,
}

impl StageCounts {
    pub fn get(&self, stage: Stage) -> u64 {
        match stage {
            Stage::GroupQualified => self.group_qualified,
            Stage::SecondaryQualified => self.secondary_qualified,
            Stage::SemiFinalist => self.semi_finalist,
            Stage::Finalist => self.finalist,
            Stage::Champion => self.champion,
        }
    }

    fn add(&mut self, other: &StageCounts) {
        self.group_winner += other.group_winner;
        self.group_runner_up += other.group_runner_up;
        self.group_qualified += other.group_qualified;
        self.secondary_qualified += other.secondary_qualified;
        self.semi_finalist += other.semi_finalist;
        self.finalist += other.finalist;
        self.champion += other.champion;
    }
}

/// Running totals. Merging is a plain sum, so merge order does not matter.
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    counts: Vec<StageCounts>,
    completed: u64,
}

impl Tally {
    pub fn new(teams: usize) -> Self {
        Self {
            counts: vec![StageCounts::default(); teams],
            completed: 0,
        }
    }

    pub fn record(&mut self, run: &RunResult) {
        for t in &run.group_winners {
            self.counts[t.index()].group_winner += 1;
        }
        for t in &run.group_runners_up {
            self.counts[t.index()].group_runner_up += 1;
        }
        for t in &run.group_qualifiers {
            self.counts[t.index()].group_qualified += 1;
        }
        for t in &run.secondary_qualifiers {
            self.counts[t.index()].secondary_qualified += 1;
        }
        for t in &run.semi_finalists {
            self.counts[t.index()].semi_finalist += 1;
        }
        for t in &run.finalists {
            self.counts[t.index()].finalist += 1;
        }
        self.counts[run.champion.index()].champion += 1;
        self.completed += 1;
    }

    pub fn merge(mut self, other: Tally) -> Tally {
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            mine.add(theirs);
        }
        self.completed += other.completed;
        self
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageProbabilities {
    pub group_winner: f64,
    pub group_runner_up: f64,
    pub group_qualified: f64,
    pub secondary_qualified: f64,
    pub semi_finalist: f64,
    pub finalist: f64,
    pub champion: f64,
}

impl StageProbabilities {
    fn from_counts(counts: &StageCounts, completed: u64) -> Self {
        let p = |c: u64| c as f64 / completed as f64;
        Self {
            group_winner: p(counts.group_winner),
            group_runner_up: p(counts.group_runner_up),
            group_qualified: p(counts.group_qualified),
            secondary_qualified: p(counts.secondary_qualified),
            semi_finalist: p(counts.semi_finalist),
            finalist: p(counts.finalist),
            champion: p(counts.champion),
        }
    }

    pub fn get(&self, stage: Stage) -> f64 {
        match stage {
            Stage::GroupQualified => self.group_qualified,
            Stage::SecondaryQualified => self.secondary_qualified,
            Stage::SemiFinalist => self.semi_finalist,
            Stage::Finalist => self.finalist,
            Stage::Champion => self.champion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamProbabilities {
    pub team: String,
    pub group: String,
    pub counts: StageCounts,
    pub probabilities: StageProbabilities,
}

/// Final, read-only result of a Monte Carlo run. Only built once every
/// worker has finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbabilityTable {
    /// Iterations asked for
    pub requested: u64,
    /// Iterations actually played; the denominator of every probability
    pub completed: u64,
    pub seed: u64,
    /// Stopped before `requested` iterations were played
    pub cancelled: bool,
    /// One row per team, in roster order
    pub teams: Vec<TeamProbabilities>,
}

impl ProbabilityTable {
    fn from_tally(
        registry: &TeamRegistry,
        tally: Tally,
        requested: u64,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        let completed = tally.completed;
        if completed == 0 {
            return Err(SimulationError::NoCompletedIterations);
        }
        check_invariants(registry, &tally)?;

        let teams = registry
            .teams()
            .iter()
            .zip(tally.counts)
            .map(|(team, counts)| TeamProbabilities {
                team: team.name.clone(),
                group: registry.group(team.group).name.clone(),
                probabilities: StageProbabilities::from_counts(&counts, completed),
                counts,
            })
            .collect::<Vec<_>>();

        let champion_sum: f64 = teams.iter().map(|t| t.probabilities.champion).sum();
        if (champion_sum - 1.0).abs() > 1e-9 {
            return Err(SimulationError::Invariant(format!(
                "champion probabilities sum to {}",
                champion_sum
            )));
        }

        Ok(Self {
            requested,
            completed,
            seed,
            cancelled: completed < requested,
            teams,
        })
    }

    pub fn team(&self, name: &str) -> Option<&TeamProbabilities> {
        self.teams.iter().find(|t| t.team == name)
    }

    /// Champion counts in roster order.
    pub fn champion_counts(&self) -> Vec<u64> {
        self.teams.iter().map(|t| t.counts.champion).collect()
    }

    /// Rows sorted by title chance, best first.
    pub fn ranked(&self) -> Vec<&TeamProbabilities> {
        let mut rows: Vec<&TeamProbabilities> = self.teams.iter().collect();
        rows.sort_by(|a, b| {
            b.counts
                .champion
                .cmp(&a.counts.champion)
                .then(b.counts.finalist.cmp(&a.counts.finalist))
                .then(a.team.cmp(&b.team))
        });
        rows
    }
}

fn check_invariants(registry: &TeamRegistry, tally: &Tally) -> Result<(), SimulationError> {
    let n = tally.completed;
    let format = registry.format();
    let expected = [
        (
            Stage::GroupQualified,
            registry.groups().len() as u64 * format.qualifiers_per_group as u64,
        ),
        (
            Stage::SecondaryQualified,
            format.pools.len() as u64 * format.qualifiers_per_pool as u64,
        ),
        (Stage::SemiFinalist, KNOCKOUT_ENTRANTS as u64),
        (Stage::Finalist, 2),
        (Stage::Champion, 1),
    ];
    for (stage, per_run) in expected {
        let total: u64 = tally.counts.iter().map(|c| c.get(stage)).sum();
        if total != per_run * n {
            return Err(SimulationError::Invariant(format!(
                "{} recorded {} times over {} runs, expected {} per run",
                stage.name(),
                total,
                n,
                per_run
            )));
        }
    }

    let groups = registry.groups().len() as u64;
    let winners: u64 = tally.counts.iter().map(|c| c.group_winner).sum();
    let runners_up: u64 = tally.counts.iter().map(|c| c.group_runner_up).sum();
    if winners != groups * n || runners_up != groups * n {
        return Err(SimulationError::Invariant(format!(
            "{} group winners and {} runners-up over {} runs of {} groups",
            winners, runners_up, n, groups
        )));
    }

    for (team, counts) in registry.teams().iter().zip(&tally.counts) {
        let chain = Stage::CHAIN.map(|s| counts.get(s));
        if chain.windows(2).any(|w| w[1] > w[0]) || counts.group_winner > counts.group_qualified {
            return Err(SimulationError::Invariant(format!(
                "stage counts for `{}` are not monotone: {:?}",
                team.name, counts
            )));
        }
    }
    Ok(())
}

/// How to drive the iterations.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub iterations: u64,
    pub seed: u64,
    /// Worker threads; 1 runs inline, 0 lets rayon pick
    pub threads: usize,
    /// Checked before every iteration
    pub stop: Option<Arc<AtomicBool>>,
}

impl RunOptions {
    pub fn new(iterations: u64, seed: u64) -> Self {
        Self {
            iterations,
            seed,
            threads: 1,
            stop: None,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stopped(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

pub struct MonteCarlo<'a> {
    registry: &'a TeamRegistry,
    tournament: Tournament<'a>,
}

impl<'a> MonteCarlo<'a> {
    pub fn new(registry: &'a TeamRegistry, model: &'a MatchModel) -> Self {
        Self {
            registry,
            tournament: Tournament::new(registry, model),
        }
    }

    pub fn run(&self, options: &RunOptions) -> Result<ProbabilityTable, SimulationError> {
        if options.iterations == 0 {
            return Err(ConfigError::ZeroIterations(options.iterations).into());
        }

        info!(
            "Simulating {} tournaments (seed={}, threads={})",
            options.iterations, options.seed, options.threads
        );
        let started = Instant::now();
        let progress = AtomicU64::new(0);

        let tally = if options.threads == 1 {
            self.run_sequential(options, &progress)?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.threads)
                .build()?;
            pool.install(|| self.run_parallel(options, &progress))?
        };

        if tally.completed() < options.iterations {
            warn!(
                "Stopped early after {} of {} iterations",
                tally.completed(),
                options.iterations
            );
        }
        let table = ProbabilityTable::from_tally(self.registry, tally, options.iterations, options.seed)?;
        info!(
            "Completed {} simulations in {:.2?}",
            table.completed,
            started.elapsed()
        );
        Ok(table)
    }

    fn run_sequential(&self, options: &RunOptions, progress: &AtomicU64) -> Result<Tally, SimulationError> {
        let mut tally = Tally::new(self.registry.len());
        for i in 0..options.iterations {
            if options.stopped() {
                break;
            }
            tally.record(&self.play_iteration(options.seed, i)?);
            report_progress(progress, options.iterations);
        }
        Ok(tally)
    }

    fn run_parallel(&self, options: &RunOptions, progress: &AtomicU64) -> Result<Tally, SimulationError> {
        let teams = self.registry.len();
        (0..options.iterations)
            .into_par_iter()
            .try_fold(
                || Tally::new(teams),
                |mut tally, i| {
                    if !options.stopped() {
                        tally.record(&self.play_iteration(options.seed, i)?);
                        report_progress(progress, options.iterations);
                    }
                    Ok::<_, SimulationError>(tally)
                },
            )
            .try_reduce(|| Tally::new(teams), |a, b| Ok(a.merge(b)))
    }

    fn play_iteration(&self, seed: u64, iteration: u64) -> Result<RunResult, SimulationError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(iteration);
        self.tournament.play(&mut rng)
    }
}

fn report_progress(progress: &AtomicU64, total: u64) {
    let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
    if done % PROGRESS_EVERY == 0 {
        debug!("Completed {} / {} simulations", done, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{uniform_registry, uniform_roster};
    use crate::registry::{Pitch, Venue};
    use crate::sim::match_model::{DecisionPolicy, ModelParams};
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn model() -> MatchModel {
        MatchModel::new(ModelParams::default()).expect("default params are valid")
    }

    fn builtin() -> TeamRegistry {
        TeamRegistry::builtin().expect("builtin roster")
    }

    #[test]
    fn zero_iterations_is_a_config_error() {
        let registry = builtin();
        let m = model();
        let err = MonteCarlo::new(&registry, &m).run(&RunOptions::new(0, 1));
        assert!(matches!(
            err,
            Err(SimulationError::Config(ConfigError::ZeroIterations(0)))
        ));
    }

    #[test]
    fn champion_probabilities_sum_to_one_and_stages_are_monotone() {
        let registry = builtin();
        let m = model();
        let table = MonteCarlo::new(&registry, &m)
            .run(&RunOptions::new(500, 17))
            .expect("run");
        let sum: f64 = table.teams.iter().map(|t| t.probabilities.champion).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        for row in &table.teams {
            let p = Stage::CHAIN.map(|s| row.probabilities.get(s));
            assert!(p.windows(2).all(|w| w[1] <= w[0]), "{}: {:?}", row.team, p);
            assert!(p.iter().all(|x| (0.0..=1.0).contains(x)));
        }
        assert_eq!(table.completed, 500);
        assert!(!table.cancelled);
        let runner_up_sum: f64 = table.teams.iter().map(|t| t.probabilities.group_runner_up).sum();
        assert_relative_eq!(runner_up_sum, 4.0, epsilon = 1e-9);
        let india = table.team("India").expect("India row");
        assert_eq!(india.group, "A");
        assert_eq!(table.ranked().len(), 20);
    }

    #[test]
    fn single_iteration_gives_certain_outcomes() {
        let registry = builtin();
        let m = model();
        let table = MonteCarlo::new(&registry, &m)
            .run(&RunOptions::new(1, 5))
            .expect("run");
        for row in &table.teams {
            for stage in Stage::CHAIN {
                let p = row.probabilities.get(stage);
                assert!(p == 0.0 || p == 1.0);
            }
        }
        let qualified = table.teams.iter().filter(|t| t.counts.group_qualified == 1).count();
        let champions = table.teams.iter().filter(|t| t.counts.champion == 1).count();
        assert_eq!(qualified, 8);
        assert_eq!(champions, 1);
        let runners_up: Vec<&TeamProbabilities> =
            table.teams.iter().filter(|t| t.counts.group_runner_up == 1).collect();
        assert_eq!(runners_up.len(), 4);
        assert!(runners_up
            .iter()
            .all(|t| t.counts.group_winner == 0 && t.counts.group_qualified == 1));
    }

    /// Champion counts for the built-in field, seed 2026, 1000 iterations.
    /// Any change to the model or to the order of draws moves these.
    const GOLDEN_CHAMPIONS_2026: [u64; 20] = [
        270, 103, 2, 6, 4, 119, 59, 10, 3, 2, 127, 88, 4, 3, 0, 68, 62, 62, 4, 4,
    ];

    #[test]
    fn fixed_seed_reproduces_table() {
        let registry = builtin();
        let m = model();
        let mc = MonteCarlo::new(&registry, &m);
        let first = mc.run(&RunOptions::new(1000, 2026)).expect("run");
        let second = mc.run(&RunOptions::new(1000, 2026)).expect("run");
        assert_eq!(first, second);
        assert_eq!(first.champion_counts(), GOLDEN_CHAMPIONS_2026.to_vec());
        assert_eq!(first.champion_counts().iter().sum::<u64>(), 1000);

        let other = mc.run(&RunOptions::new(1000, 2027)).expect("run");
        assert_ne!(first.champion_counts(), other.champion_counts());
    }

    #[test]
    fn thread_count_does_not_change_results() {
        let registry = builtin();
        let m = model();
        let mc = MonteCarlo::new(&registry, &m);
        let sequential = mc.run(&RunOptions::new(400, 8)).expect("run");
        let parallel = mc
            .run(&RunOptions::new(400, 8).with_threads(4))
            .expect("run");
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn identical_teams_get_similar_odds() {
        let registry = uniform_registry();
        let m = model();
        let table = MonteCarlo::new(&registry, &m)
            .run(&RunOptions::new(4000, 3).with_threads(0))
            .expect("run");
        for row in &table.teams {
            assert!(
                (row.probabilities.group_qualified - 0.4).abs() < 0.05,
                "{} qualifies {:.3}",
                row.team,
                row.probabilities.group_qualified
            );
            assert!(
                (row.probabilities.champion - 0.05).abs() < 0.025,
                "{} wins {:.3}",
                row.team,
                row.probabilities.champion
            );
        }
    }

    #[test]
    fn identical_teams_get_similar_odds_on_spin_pitches_when_scores_decide() {
        let mut roster = uniform_roster();
        let spin = Venue::new("Ground", Pitch::Spin);
        for group in &mut roster.groups {
            group.venue = spin.clone();
        }
        for pool in &mut roster.format.pools {
            pool.venue = spin.clone();
        }
        roster.format.knockout_venue = spin.clone();
        roster.format.final_venue = spin;
        let registry = TeamRegistry::from_roster(roster).expect("roster");
        let m = MatchModel::new(ModelParams {
            policy: DecisionPolicy::ScoreDraw,
            ..ModelParams::default()
        })
        .expect("params");

        let table = MonteCarlo::new(&registry, &m)
            .run(&RunOptions::new(4000, 3).with_threads(0))
            .expect("run");
        for row in &table.teams {
            assert!(
                (row.probabilities.group_qualified - 0.4).abs() < 0.05,
                "{} qualifies {:.3}",
                row.team,
                row.probabilities.group_qualified
            );
            assert!(
                (row.probabilities.champion - 0.05).abs() < 0.025,
                "{} wins {:.3}",
                row.team,
                row.probabilities.champion
            );
        }
    }

    #[test]
    fn estimates_converge_across_seeds() {
        let registry = builtin();
        let m = model();
        let mc = MonteCarlo::new(&registry, &m);
        let a = mc
            .run(&RunOptions::new(10_000, 1).with_threads(0))
            .expect("run");
        let b = mc
            .run(&RunOptions::new(10_000, 2).with_threads(0))
            .expect("run");
        for (x, y) in a.teams.iter().zip(&b.teams) {
            for stage in Stage::CHAIN {
                let diff = (x.probabilities.get(stage) - y.probabilities.get(stage)).abs();
                assert!(diff < 0.04, "{} {}: {:.4}", x.team, stage.name(), diff);
            }
        }
    }

    #[test]
    fn stop_flag_before_start_yields_no_table() {
        let registry = builtin();
        let m = model();
        let stop = Arc::new(AtomicBool::new(true));
        let err = MonteCarlo::new(&registry, &m).run(&RunOptions::new(100, 1).with_stop(stop));
        assert!(matches!(err, Err(SimulationError::NoCompletedIterations)));
    }

    #[test]
    fn stop_flag_mid_run_keeps_a_valid_table() {
        let registry = builtin();
        let m = model();
        let stop = Arc::new(AtomicBool::new(false));
        let trigger = Arc::clone(&stop);
        let timer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            trigger.store(true, Ordering::Relaxed);
        });
        let table = MonteCarlo::new(&registry, &m)
            .run(&RunOptions::new(1_000_000, 9).with_threads(2).with_stop(stop))
            .expect("partial run");
        timer.join().expect("timer thread");

        assert!(table.cancelled);
        assert!(table.completed > 0 && table.completed < table.requested);
        let sum: f64 = table.teams.iter().map(|t| t.probabilities.champion).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn tally_merge_is_a_sum() {
        let registry = builtin();
        let m = model();
        let tournament = Tournament::new(&registry, &m);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let runs: Vec<RunResult> = (0..6)
            .map(|_| tournament.play(&mut rng).expect("run"))
            .collect();

        let mut whole = Tally::new(registry.len());
        runs.iter().for_each(|r| whole.record(r));
        let mut left = Tally::new(registry.len());
        let mut right = Tally::new(registry.len());
        runs[..2].iter().for_each(|r| left.record(r));
        runs[2..].iter().for_each(|r| right.record(r));

        assert_eq!(right.clone().merge(left.clone()), whole);
        assert_eq!(left.merge(right), whole);
    }
}
