//! Immutable team arena, group assignments and tournament format.
//!
//! Everything here is validated once at construction. Simulation code can
//! index teams by [`TeamId`] without re-checking attributes.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::info;

use crate::error::{ConfigError, RegistryError};

pub mod models;
pub use models::*;

/// Semi-final entrants required by the knockout format.
pub const KNOCKOUT_ENTRANTS: usize = 4;

const BUILTIN_ROSTER: &str = include_str!("../../data/t20_world_cup_2026.json");

/// Secondary-stage pool with slots resolved against the registry's groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub name: String,
    pub venue: Venue,
    /// (group, 1-based finishing position)
    pub slots: Vec<(GroupId, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TournamentFormat {
    pub qualifiers_per_group: usize,
    pub pools: Vec<Pool>,
    pub qualifiers_per_pool: usize,
    pub knockout_venue: Venue,
    pub final_venue: Venue,
}

#[derive(Debug, Clone)]
pub struct TeamRegistry {
    teams: Vec<Team>,
    groups: Vec<Group>,
    format: TournamentFormat,
}

impl TeamRegistry {
    /// The 20-team 2026 field shipped with the crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_ROSTER)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_json(&raw)?;
        info!(
            "Loaded roster {} ({} teams, {} groups)",
            path.display(),
            registry.teams.len(),
            registry.groups.len()
        );
        Ok(registry)
    }

    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let roster: Roster = serde_json::from_str(raw)?;
        Self::from_roster(roster)
    }

    pub fn from_roster(roster: Roster) -> Result<Self, RegistryError> {
        let Roster {
            teams: records,
            groups: group_specs,
            format,
        } = roster;

        let mut index_by_name: HashMap<String, TeamId> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            validate_record(record)?;
            if index_by_name.insert(record.name.clone(), TeamId(i)).is_some() {
                return Err(RegistryError::DuplicateTeam(record.name.clone()));
            }
        }

        let mut assigned: Vec<Option<GroupId>> = vec![None; records.len()];
        let mut groups = Vec::with_capacity(group_specs.len());
        let mut group_names = HashSet::new();
        for (g, spec) in group_specs.into_iter().enumerate() {
            if !group_names.insert(spec.name.clone()) {
                return Err(RegistryError::DuplicateGroup(spec.name));
            }
            let gid = GroupId(g);
            let mut members = Vec::with_capacity(spec.teams.len());
            for name in &spec.teams {
                let id = *index_by_name
                    .get(name)
                    .ok_or_else(|| RegistryError::UnknownTeam {
                        group: spec.name.clone(),
                        team: name.clone(),
                    })?;
                if let Some(prev) = assigned[id.0] {
                    let first: &Group = &groups[prev.0];
                    return Err(RegistryError::MultipleGroups {
                        team: name.clone(),
                        first: first.name.clone(),
                        second: spec.name.clone(),
                    });
                }
                assigned[id.0] = Some(gid);
                members.push(id);
            }
            groups.push(Group {
                id: gid,
                name: spec.name,
                venue: spec.venue,
                members,
            });
        }

        let mut teams = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let group = assigned[i].ok_or_else(|| RegistryError::Unassigned(record.name.clone()))?;
            teams.push(Team::from_record(TeamId(i), group, record));
        }

        let format = resolve_format(format, &groups)?;

        Ok(Self {
            teams,
            groups,
            format,
        })
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, id: TeamId) -> &Team {
        &self.teams[id.0]
    }

    pub fn find(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name == name)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    pub fn format(&self) -> &TournamentFormat {
        &self.format
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

fn validate_record(record: &TeamRecord) -> Result<(), RegistryError> {
    let out_of_range = |field: &'static str, value: f64| RegistryError::OutOfRange {
        team: record.name.clone(),
        field,
        value,
    };

    if !record.rating.is_finite() {
        return Err(out_of_range("rating", record.rating));
    }
    if record.rank == 0 {
        return Err(out_of_range("rank", 0.0));
    }
    for (field, value) in [
        ("form", record.form),
        ("squad_quality", record.squad_quality),
        ("spin_strength", record.spin_strength),
        ("pace_strength", record.pace_strength),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(out_of_range(field, value));
        }
    }
    for (field, value) in [
        ("avg_runs_scored", record.avg_runs_scored),
        ("avg_runs_conceded", record.avg_runs_conceded),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(out_of_range(field, value));
        }
    }
    Ok(())
}

fn format_error(field: &'static str, reason: impl Into<String>) -> RegistryError {
    RegistryError::Config(ConfigError::Format {
        field,
        reason: reason.into(),
    })
}

fn resolve_format(spec: FormatSpec, groups: &[Group]) -> Result<TournamentFormat, RegistryError> {
    let Some(first) = groups.first() else {
        return Err(format_error("groups", "at least one group is required"));
    };
    let group_size = first.members.len();
    if let Some(uneven) = groups.iter().find(|g| g.members.len() != group_size) {
        return Err(format_error(
            "groups",
            format!(
                "group `{}` has {} teams but `{}` has {}",
                uneven.name,
                uneven.members.len(),
                first.name,
                group_size
            ),
        ));
    }
    if group_size < 2 {
        return Err(format_error("groups", "groups need at least two teams"));
    }

    let k = spec.qualifiers_per_group;
    if k == 0 || k >= group_size {
        return Err(format_error(
            "qualifiers_per_group",
            format!("must be between 1 and {}, got {}", group_size - 1, k),
        ));
    }

    let group_by_name: HashMap<&str, GroupId> =
        groups.iter().map(|g| (g.name.as_str(), g.id)).collect();
    let mut seen: HashSet<(GroupId, usize)> = HashSet::new();
    let mut pools = Vec::with_capacity(spec.pools.len());
    for pool in spec.pools {
        let mut slots = Vec::with_capacity(pool.slots.len());
        for slot in &pool.slots {
            let gid = *group_by_name.get(slot.group.as_str()).ok_or_else(|| {
                format_error(
                    "pools",
                    format!("pool `{}` references unknown group `{}`", pool.name, slot.group),
                )
            })?;
            if slot.position == 0 || slot.position > k {
                return Err(format_error(
                    "pools",
                    format!(
                        "pool `{}` slot {}{} is not a qualifying position",
                        pool.name, slot.group, slot.position
                    ),
                ));
            }
            if !seen.insert((gid, slot.position)) {
                return Err(format_error(
                    "pools",
                    format!("slot {}{} is used twice", slot.group, slot.position),
                ));
            }
            slots.push((gid, slot.position));
        }
        pools.push(Pool {
            name: pool.name,
            venue: pool.venue,
            slots,
        });
    }

    if seen.len() != groups.len() * k {
        return Err(format_error(
            "pools",
            format!(
                "pools hold {} slots but {} teams qualify from the groups",
                seen.len(),
                groups.len() * k
            ),
        ));
    }

    let m = spec.qualifiers_per_pool;
    if let Some(small) = pools.iter().find(|p| p.slots.len() <= m) {
        return Err(format_error(
            "qualifiers_per_pool",
            format!("pool `{}` has only {} teams for {} places", small.name, small.slots.len(), m),
        ));
    }
    if m == 0 || pools.len() * m != KNOCKOUT_ENTRANTS {
        return Err(format_error(
            "qualifiers_per_pool",
            format!(
                "{} pools x {} qualifiers must give {} semi-finalists",
                pools.len(),
                m,
                KNOCKOUT_ENTRANTS
            ),
        ));
    }

    Ok(TournamentFormat {
        qualifiers_per_group: k,
        pools,
        qualifiers_per_pool: m,
        knockout_venue: spec.knockout_venue,
        final_venue: spec.final_venue,
    })
}
