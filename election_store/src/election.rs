use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::config::*;

/// One election: its candidates, its vote counts and where it stands in its
/// lifecycle.
///
/// Invariant: the keys of the vote counts are exactly the ids of the current
/// candidates. Every operation checks all its preconditions before touching
/// anything, so a failed call leaves the election unchanged.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ElectionRecord", into = "ElectionRecord")]
pub struct Election {
    id: ElectionId,
    name: String,
    description: String,
    status: ElectionStatus,
    // Registration order.
    candidates: Vec<Candidate>,
    votes: BTreeMap<CandidateId, u64>,
    created_at: DateTime<Utc>,
}

impl Election {
    /// A new election in status `Setup`, without any candidate.
    pub fn new(name: &str, description: &str) -> StoreResult<Election> {
        let name = name.trim();
        ensure!(
            !name.is_empty(),
            ValidationSnafu {
                field: "name",
                reason: "must not be empty",
            }
        );
        Ok(Election {
            id: ElectionId::fresh(),
            name: name.to_string(),
            description: description.trim().to_string(),
            status: ElectionStatus::Setup,
            candidates: Vec::new(),
            votes: BTreeMap::new(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &ElectionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The description, empty if none was given.
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    pub fn status(&self) -> ElectionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The candidates, in registration order.
    pub fn candidates(&self) -> &[Candidate] {
        self.candidates.as_slice()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// The candidates, by increasing ballot number.
    pub fn candidates_by_number(&self) -> Vec<&Candidate> {
        let mut res: Vec<&Candidate> = self.candidates.iter().collect();
        res.sort_by_key(|c| c.number);
        res
    }

    pub fn candidate(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == *id)
    }

    pub fn candidate_by_number(&self, number: u32) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.number == number)
    }

    /// The number of votes received by a candidate of this election.
    pub fn votes_for(&self, id: &CandidateId) -> Option<u64> {
        self.votes.get(id).cloned()
    }

    pub fn total_votes(&self) -> u64 {
        self.votes.values().sum()
    }

    /// Registers a new candidate with zero votes.
    ///
    /// The name and party are trimmed. The ballot number must be positive and
    /// not already used in this election.
    pub fn add_candidate(&mut self, name: &str, number: i64, party: &str) -> StoreResult<Candidate> {
        ensure!(
            self.status.accepts_candidates(),
            InvalidTransitionSnafu {
                action: Action::AddCandidate,
                status: self.status,
            }
        );
        let name = name.trim();
        ensure!(
            !name.is_empty(),
            ValidationSnafu {
                field: "name",
                reason: "must not be empty",
            }
        );
        ensure!(
            number > 0,
            ValidationSnafu {
                field: "number",
                reason: format!("{} is not a positive integer", number),
            }
        );
        let number = u32::try_from(number).ok().context(ValidationSnafu {
            field: "number",
            reason: format!("{} is too large", number),
        })?;
        ensure!(
            self.candidate_by_number(number).is_none(),
            DuplicateNumberSnafu { number }
        );

        let mut id = CandidateId::fresh();
        while self.votes.contains_key(&id) {
            id = CandidateId::fresh();
        }
        let candidate = Candidate {
            id: id.clone(),
            name: name.to_string(),
            number,
            party: party.trim().to_string(),
        };
        self.candidates.push(candidate.clone());
        self.votes.insert(id, 0);
        debug!(
            "election {}: registered candidate {} with number {}",
            self.id, candidate.name, number
        );
        Ok(candidate)
    }

    /// Removes a candidate together with its votes.
    pub fn remove_candidate(&mut self, id: &CandidateId) -> StoreResult<Candidate> {
        ensure!(
            self.status.accepts_candidates(),
            InvalidTransitionSnafu {
                action: Action::RemoveCandidate,
                status: self.status,
            }
        );
        let idx = self
            .candidates
            .iter()
            .position(|c| c.id == *id)
            .context(NotFoundSnafu {
                entity: Entity::Candidate,
                id: id.as_str(),
            })?;
        let candidate = self.candidates.remove(idx);
        let dropped = self.votes.remove(id).unwrap_or(0);
        debug!(
            "election {}: removed candidate {} ({} votes dropped)",
            self.id, candidate.name, dropped
        );
        Ok(candidate)
    }

    /// Opens the voting window. Requires at least one candidate.
    pub fn start_voting(&mut self) -> StoreResult<()> {
        ensure!(
            self.status == ElectionStatus::Setup,
            InvalidTransitionSnafu {
                action: Action::StartVoting,
                status: self.status,
            }
        );
        ensure!(
            !self.candidates.is_empty(),
            ValidationSnafu {
                field: "candidates",
                reason: "no candidates",
            }
        );
        self.status = ElectionStatus::Voting;
        Ok(())
    }

    /// Closes the voting window for good.
    pub fn end_voting(&mut self) -> StoreResult<()> {
        ensure!(
            self.status == ElectionStatus::Voting,
            InvalidTransitionSnafu {
                action: Action::EndVoting,
                status: self.status,
            }
        );
        self.status = ElectionStatus::Ended;
        Ok(())
    }

    /// Records one vote for a candidate and returns its new count.
    ///
    /// There is no notion of voter here: the same candidate may receive any
    /// number of votes.
    pub fn cast_vote(&mut self, id: &CandidateId) -> StoreResult<u64> {
        ensure!(
            self.status.accepts_votes(),
            InvalidTransitionSnafu {
                action: Action::CastVote,
                status: self.status,
            }
        );
        let count = self.votes.get_mut(id).context(NotFoundSnafu {
            entity: Entity::Candidate,
            id: id.as_str(),
        })?;
        *count += 1;
        debug!("election {}: vote for {} -> {}", self.id, id, count);
        Ok(*count)
    }

    /// The current results.
    pub fn tally(&self) -> Tally {
        let total_votes = self.total_votes();
        let mut rows: Vec<TallyRow> = self
            .candidates
            .iter()
            .map(|c| {
                let votes = self.votes_for(&c.id).unwrap_or(0);
                TallyRow {
                    candidate: c.clone(),
                    votes,
                    percentage: percentage(votes, total_votes),
                }
            })
            .collect();
        // Stable: equal counts stay in registration order.
        rows.sort_by(|a, b| b.votes.cmp(&a.votes));
        Tally { total_votes, rows }
    }

    pub fn summary(&self) -> ElectionSummary {
        ElectionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
            candidate_count: self.candidates.len(),
            total_votes: self.total_votes(),
            created_at: self.created_at,
        }
    }
}

fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 1000.0 / total as f64).round() / 10.0
}

// ********* Stored layout ***********

// The candidate records carry a copy of their vote count for readers of the
// raw collection. The vote map stays the reference when both disagree.

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ElectionRecord {
    id: ElectionId,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    candidates: Vec<CandidateRecord>,
    #[serde(default)]
    votes: BTreeMap<CandidateId, u64>,
    status: ElectionStatus,
    created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct CandidateRecord {
    id: CandidateId,
    name: String,
    // Older collections may hold numbers that are no longer accepted.
    number: i64,
    #[serde(default)]
    party: String,
    #[serde(default)]
    votes: u64,
}

impl From<Election> for ElectionRecord {
    fn from(e: Election) -> Self {
        let Election {
            id,
            name,
            description,
            status,
            candidates,
            votes,
            created_at,
        } = e;
        let candidates = candidates
            .into_iter()
            .map(|c| CandidateRecord {
                votes: votes.get(&c.id).cloned().unwrap_or(0),
                id: c.id,
                name: c.name,
                number: i64::from(c.number),
                party: c.party,
            })
            .collect();
        ElectionRecord {
            id,
            name,
            description,
            candidates,
            votes,
            status,
            created_at,
        }
    }
}

impl From<ElectionRecord> for Election {
    fn from(record: ElectionRecord) -> Self {
        let ElectionRecord {
            id,
            name,
            description,
            candidates: candidate_records,
            votes: mut stored_votes,
            status,
            created_at,
        } = record;

        let mut candidates: Vec<Candidate> = Vec::with_capacity(candidate_records.len());
        let mut votes: BTreeMap<CandidateId, u64> = BTreeMap::new();
        let mut numbers: BTreeSet<u32> = BTreeSet::new();
        for cr in candidate_records {
            if votes.contains_key(&cr.id) {
                warn!("election {}: dropping duplicate candidate id {}", id, cr.id);
                continue;
            }
            let number = match u32::try_from(cr.number) {
                Ok(n) if n > 0 && !numbers.contains(&n) => n,
                _ => {
                    let dropped = stored_votes.remove(&cr.id).unwrap_or(cr.votes);
                    warn!(
                        "election {}: dropping candidate {} with unusable ballot number {} ({} votes)",
                        id, cr.id, cr.number, dropped
                    );
                    continue;
                }
            };
            numbers.insert(number);
            let count = match stored_votes.remove(&cr.id) {
                Some(n) => {
                    if n != cr.votes {
                        warn!(
                            "election {}: candidate {} records {} votes, vote map says {}",
                            id, cr.id, cr.votes, n
                        );
                    }
                    n
                }
                None => {
                    warn!(
                        "election {}: candidate {} missing from the vote map, using {}",
                        id, cr.id, cr.votes
                    );
                    cr.votes
                }
            };
            votes.insert(cr.id.clone(), count);
            candidates.push(Candidate {
                id: cr.id,
                name: cr.name,
                number,
                party: cr.party,
            });
        }
        for (orphan, n) in stored_votes {
            warn!(
                "election {}: dropping {} votes for unknown candidate {}",
                id, n, orphan
            );
        }

        Election {
            id,
            name,
            description,
            status,
            candidates,
            votes,
            created_at,
        }
    }
}
