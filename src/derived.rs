//! Two-sided team statistics: pairs the two participants of each fixture so a
//! team row can carry its opponent's recorded value.

use std::collections::HashMap;

use crate::error::PairingError;
use crate::model::Appearance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sides {
    first: usize,
    second: Option<usize>,
}

/// Lookup from `fixture_id` to the (at most two) participant rows of that fixture.
#[derive(Debug, Clone)]
pub struct FixturePairing<'a> {
    rows: &'a [Appearance],
    by_fixture: HashMap<u64, Sides>,
}

impl<'a> FixturePairing<'a> {
    pub fn build(rows: &'a [Appearance]) -> Result<Self, PairingError> {
        let mut by_fixture: HashMap<u64, Sides> = HashMap::with_capacity(rows.len() / 2 + 1);
        for (idx, row) in rows.iter().enumerate() {
            match by_fixture.get_mut(&row.fixture_id) {
                None => {
                    by_fixture.insert(
                        row.fixture_id,
                        Sides {
                            first: idx,
                            second: None,
                        },
                    );
                }
                Some(sides) => {
                    if rows[sides.first].entity_id == row.entity_id {
                        return Err(PairingError::DuplicateParticipant {
                            fixture_id: row.fixture_id,
                            team_id: row.entity_id,
                        });
                    }
                    if sides.second.is_some() {
                        return Err(PairingError::TooManyParticipants {
                            fixture_id: row.fixture_id,
                        });
                    }
                    sides.second = Some(idx);
                }
            }
        }
        Ok(Self { rows, by_fixture })
    }

    pub fn fixtures(&self) -> usize {
        self.by_fixture.len()
    }

    /// The other participant of `fixture_id`, if both sides are present.
    pub fn opponent(&self, fixture_id: u64, team_id: u32) -> Option<&'a Appearance> {
        let sides = self.by_fixture.get(&fixture_id)?;
        let first = &self.rows[sides.first];
        let second = &self.rows[sides.second?];
        if first.entity_id == team_id {
            Some(second)
        } else if second.entity_id == team_id {
            Some(first)
        } else {
            None
        }
    }

    /// Anchor rows keep their own attribution; `value` becomes the opponent's raw
    /// value, or `None` when the opponent row or its value is missing.
    pub fn conceded_rows(&self) -> Vec<Appearance> {
        self.rows
            .iter()
            .map(|anchor| {
                let value = self
                    .opponent(anchor.fixture_id, anchor.entity_id)
                    .and_then(|opp| opp.value);
                Appearance {
                    value,
                    ..anchor.clone()
                }
            })
            .collect()
    }

    /// Own value plus opponent value; `None` unless both are recorded.
    pub fn match_total_rows(&self) -> Vec<Appearance> {
        self.rows
            .iter()
            .map(|anchor| {
                let opp = self
                    .opponent(anchor.fixture_id, anchor.entity_id)
                    .and_then(|opp| opp.value);
                let value = match (anchor.value, opp) {
                    (Some(own), Some(opp)) => Some(own + opp),
                    _ => None,
                };
                Appearance {
                    value,
                    ..anchor.clone()
                }
            })
            .collect()
    }
}
