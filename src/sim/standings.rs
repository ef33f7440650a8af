//! Stage-scoped points tables.
//!
//! Ranking is a total order: points, then net run rate, then head-to-head
//! wins among the teams still level, then the order in which teams entered
//! the table.

use std::cmp::Ordering;

use serde::Serialize;

use super::match_model::MatchResult;
use crate::registry::TeamId;

pub const POINTS_FOR_WIN: u32 = 2;

/// Overs per innings, used to turn run differentials into a rate.
const OVERS_PER_INNINGS: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub team: TeamId,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub points: u32,
    pub runs_for: u32,
    pub runs_against: u32,
}

impl Standing {
    fn new(team: TeamId) -> Self {
        Self {
            team,
            played: 0,
            won: 0,
            lost: 0,
            points: 0,
            runs_for: 0,
            runs_against: 0,
        }
    }

    /// Run differential per over across all matches played.
    pub fn net_run_rate(&self) -> f64 {
        if self.played == 0 {
            return 0.0;
        }
        let diff = self.runs_for as f64 - self.runs_against as f64;
        diff / (OVERS_PER_INNINGS * self.played as f64)
    }
}

/// Points table for one group or pool.
#[derive(Debug, Clone)]
pub struct Table {
    standings: Vec<Standing>,
    results: Vec<MatchResult>,
}

impl Table {
    pub fn new(teams: &[TeamId]) -> Self {
        Self {
            standings: teams.iter().copied().map(Standing::new).collect(),
            results: Vec::new(),
        }
    }

    /// Record a match between two teams of this table. Results involving
    /// outsiders are ignored.
    pub fn record(&mut self, result: MatchResult) {
        let (Some(ia), Some(ib)) = (self.position(result.team_a), self.position(result.team_b))
        else {
            return;
        };
        for idx in [ia, ib] {
            let s = &mut self.standings[idx];
            let (scored, conceded) = result.runs_for(s.team);
            s.played += 1;
            s.runs_for += scored;
            s.runs_against += conceded;
            if result.winner == s.team {
                s.won += 1;
                s.points += POINTS_FOR_WIN;
            } else {
                s.lost += 1;
            }
        }
        self.results.push(result);
    }

    pub fn results(&self) -> &[MatchResult] {
        &self.results
    }

    fn position(&self, team: TeamId) -> Option<usize> {
        self.standings.iter().position(|s| s.team == team)
    }

    /// Standings ordered from first to last place.
    pub fn ranked(&self) -> Vec<Standing> {
        let mut order: Vec<usize> = (0..self.standings.len()).collect();
        order.sort_by(|&x, &y| self.primary_cmp(x, y).then(x.cmp(&y)));

        // Re-order each block still level on points and net run rate.
        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && self.primary_cmp(order[start], order[end]) == Ordering::Equal
            {
                end += 1;
            }
            if end - start > 1 {
                let block: Vec<TeamId> =
                    order[start..end].iter().map(|&i| self.standings[i].team).collect();
                let h2h: Vec<u32> = block.iter().map(|&t| self.head_to_head_wins(t, &block)).collect();
                order[start..end].sort_by(|&x, &y| {
                    let hx = h2h[block_index(&block, self.standings[x].team)];
                    let hy = h2h[block_index(&block, self.standings[y].team)];
                    hy.cmp(&hx).then(x.cmp(&y))
                });
            }
            start = end;
        }

        order.into_iter().map(|i| self.standings[i].clone()).collect()
    }

    /// Descending on points, then net run rate.
    fn primary_cmp(&self, x: usize, y: usize) -> Ordering {
        let (a, b) = (&self.standings[x], &self.standings[y]);
        b.points
            .cmp(&a.points)
            .then_with(|| b.net_run_rate().total_cmp(&a.net_run_rate()))
    }

    fn head_to_head_wins(&self, team: TeamId, among: &[TeamId]) -> u32 {
        self.results
            .iter()
            .filter(|r| r.winner == team && among.contains(&r.loser()))
            .count() as u32
    }
}

fn block_index(block: &[TeamId], team: TeamId) -> usize {
    block.iter().position(|&t| t == team).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn result(a: usize, b: usize, score_a: u32, score_b: u32) -> MatchResult {
        let (ta, tb) = (TeamId(a), TeamId(b));
        MatchResult {
            team_a: ta,
            team_b: tb,
            score_a,
            score_b,
            winner: if score_a > score_b { ta } else { tb },
            toss_winner: ta,
            super_over: false,
        }
    }

    fn ids(n: usize) -> Vec<TeamId> {
        (0..n).map(TeamId).collect()
    }

    fn order(table: &Table) -> Vec<usize> {
        table.ranked().iter().map(|s| s.team.index()).collect()
    }

    #[test]
    fn points_and_net_run_rate_accumulate() {
        let mut table = Table::new(&ids(2));
        table.record(result(0, 1, 180, 150));
        let ranked = table.ranked();
        assert_eq!(ranked[0].team, TeamId(0));
        assert_eq!(ranked[0].points, 2);
        assert_eq!(ranked[1].points, 0);
        assert_relative_eq!(ranked[0].net_run_rate(), 1.5, epsilon = 1e-12);
        assert_relative_eq!(ranked[1].net_run_rate(), -1.5, epsilon = 1e-12);
    }

    #[test]
    fn net_run_rate_breaks_points_tie() {
        let mut table = Table::new(&ids(3));
        table.record(result(0, 1, 160, 150));
        table.record(result(1, 2, 200, 120));
        table.record(result(2, 0, 170, 165));
        // All on 2 points; NRR: T0 +5/40, T1 +70/40, T2 -75/40.
        assert_eq!(order(&table), vec![1, 0, 2]);
    }

    #[test]
    fn head_to_head_breaks_exact_tie() {
        // T2 and T3 finish level on points and run rate; T3 won their meeting.
        let mut table = Table::new(&ids(4));
        table.record(result(0, 3, 170, 160));
        table.record(result(3, 2, 160, 150));
        table.record(result(2, 0, 170, 150));
        table.record(result(1, 0, 200, 150));
        table.record(result(1, 2, 170, 150));
        table.record(result(1, 3, 160, 150));
        let ranked = table.ranked();
        let t2 = ranked.iter().find(|s| s.team == TeamId(2)).expect("T2");
        let t3 = ranked.iter().find(|s| s.team == TeamId(3)).expect("T3");
        assert_eq!(t2.points, t3.points);
        assert_eq!(t2.net_run_rate(), t3.net_run_rate());
        assert_eq!(order(&table), vec![1, 3, 2, 0]);
    }

    #[test]
    fn head_to_head_cycle_falls_back_to_entry_order() {
        // T4 beats T1, T1 beats T6, T6 beats T4, all by ten runs.
        let mut table = Table::new(&[TeamId(6), TeamId(4), TeamId(1)]);
        table.record(result(4, 1, 160, 150));
        table.record(result(1, 6, 160, 150));
        table.record(result(6, 4, 160, 150));
        let ranked = table.ranked();
        assert!(ranked.iter().all(|s| s.points == 2 && s.net_run_rate() == 0.0));
        assert_eq!(order(&table), vec![6, 4, 1]);
    }

    #[test]
    fn entry_order_is_the_last_resort() {
        let table = Table::new(&[TeamId(7), TeamId(3), TeamId(5)]);
        assert_eq!(order(&table), vec![7, 3, 5]);
    }

    #[test]
    fn ignores_matches_with_outsiders() {
        let mut table = Table::new(&ids(2));
        table.record(result(0, 9, 200, 100));
        assert!(table.results().is_empty());
        assert!(table.ranked().iter().all(|s| s.played == 0));
    }
}
