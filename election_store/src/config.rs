// ********* Identifiers ***********

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use uuid::Uuid;

/// The identifier of an election, unique within a store.
///
/// Freshly created elections get a random UUID. Identifiers read back from
/// storage are kept as-is, whatever their shape.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElectionId(String);

/// The identifier of a candidate, unique within its election.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub(crate) fn fresh() -> $name {
                $name(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ElectionId);
string_id!(CandidateId);

// ********* Election data structures ***********

/// The lifecycle stage of an election.
///
/// Stages only move forward: `Setup` -> `Voting` -> `Ended`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Candidates are being registered. No votes yet.
    Setup,
    /// The voting window is open.
    Voting,
    /// Voting is closed for good.
    Ended,
}

impl ElectionStatus {
    pub fn accepts_candidates(self) -> bool {
        matches!(self, ElectionStatus::Setup | ElectionStatus::Voting)
    }

    pub fn accepts_votes(self) -> bool {
        self == ElectionStatus::Voting
    }

    pub fn is_terminal(self) -> bool {
        self == ElectionStatus::Ended
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ElectionStatus::Setup => "setup",
            ElectionStatus::Voting => "voting",
            ElectionStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// An entrant in one election.
///
/// The vote count is not stored here: it is read from the election with
/// [`crate::Election::votes_for`].
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    /// The ballot number, unique within the election and always positive.
    pub number: u32,
    /// Party or affiliation. Empty when the candidate has none.
    pub party: String,
}

impl Candidate {
    pub fn party(&self) -> Option<&str> {
        if self.party.is_empty() {
            None
        } else {
            Some(self.party.as_str())
        }
    }
}

// ******** Output data structures *********

/// One line of the results table.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct TallyRow {
    pub candidate: Candidate,
    pub votes: u64,
    /// Share of the total, in percent, rounded to one decimal place.
    pub percentage: f64,
}

/// The results of an election, most voted first.
///
/// Candidates with the same number of votes keep their registration order.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub total_votes: u64,
    pub rows: Vec<TallyRow>,
}

impl Tally {
    /// The candidate currently in front, if anybody has received a vote.
    pub fn leader(&self) -> Option<&TallyRow> {
        self.rows.first().filter(|r| r.votes > 0)
    }
}

/// The overview of an election, as shown in a list of elections.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    pub id: ElectionId,
    pub name: String,
    pub description: String,
    pub status: ElectionStatus,
    pub candidate_count: usize,
    pub total_votes: u64,
    pub created_at: DateTime<Utc>,
}

// ********* Configuration **********

/// Settings of an [`crate::ElectionStore`].
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct StoreSettings {
    /// The name of the storage slot holding the whole collection.
    pub slot: String,
    /// Write indented JSON instead of a single line.
    pub pretty_print: bool,
}

impl StoreSettings {
    pub const DEFAULT_SLOT: &'static str = "elections";
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            slot: StoreSettings::DEFAULT_SLOT.to_string(),
            pretty_print: false,
        }
    }
}

// ********* Errors **********

/// The operation that was refused by the lifecycle of an election.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Action {
    AddCandidate,
    RemoveCandidate,
    StartVoting,
    EndVoting,
    CastVote,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::AddCandidate => "add a candidate",
            Action::RemoveCandidate => "remove a candidate",
            Action::StartVoting => "start voting",
            Action::EndVoting => "end voting",
            Action::CastVote => "cast a vote",
        };
        f.write_str(s)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Entity {
    Election,
    Candidate,
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Election => f.write_str("election"),
            Entity::Candidate => f.write_str("candidate"),
        }
    }
}

/// The broad classes of [`StoreError`].
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorKind {
    Validation,
    DuplicateNumber,
    InvalidTransition,
    NotFound,
    Storage,
}

/// Errors reported by the store.
///
/// None of them is fatal: a failed operation leaves every election as it was.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("invalid {field}: {reason}"))]
    Validation { field: &'static str, reason: String },

    #[snafu(display("ballot number {number} is already taken in this election"))]
    DuplicateNumber { number: u32 },

    #[snafu(display("cannot {action} while the election is in status {status}"))]
    InvalidTransition {
        action: Action,
        status: ElectionStatus,
    },

    #[snafu(display("{entity} {id} not found"))]
    NotFound { entity: Entity, id: String },

    #[snafu(display("failed to read storage slot {slot}"))]
    ReadSlot {
        source: std::io::Error,
        slot: String,
    },

    #[snafu(display("failed to write storage slot {slot}"))]
    WriteSlot {
        source: std::io::Error,
        slot: String,
    },

    #[snafu(display("failed to encode the elections"))]
    Encode { source: serde_json::Error },

    #[snafu(display("storage slot {slot} does not hold a valid election collection"))]
    Decode {
        source: serde_json::Error,
        slot: String,
    },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation { .. } => ErrorKind::Validation,
            StoreError::DuplicateNumber { .. } => ErrorKind::DuplicateNumber,
            StoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::ReadSlot { .. }
            | StoreError::WriteSlot { .. }
            | StoreError::Encode { .. }
            | StoreError::Decode { .. } => ErrorKind::Storage,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        let js = serde_json::to_string(&[
            ElectionStatus::Setup,
            ElectionStatus::Voting,
            ElectionStatus::Ended,
        ])
        .unwrap();
        assert_eq!(js, r#"["setup","voting","ended"]"#);
    }

    #[test]
    fn status_capabilities() {
        assert!(ElectionStatus::Setup.accepts_candidates());
        assert!(ElectionStatus::Voting.accepts_candidates());
        assert!(!ElectionStatus::Ended.accepts_candidates());
        assert!(!ElectionStatus::Setup.accepts_votes());
        assert!(ElectionStatus::Voting.accepts_votes());
        assert!(ElectionStatus::Ended.is_terminal());
    }

    #[test]
    fn fresh_ids_are_distinct() {
        let a = ElectionId::fresh();
        let b = ElectionId::fresh();
        assert_ne!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), format!("\"{}\"", a));
    }

    #[test]
    fn error_kinds_and_messages() {
        let e = StoreError::InvalidTransition {
            action: Action::CastVote,
            status: ElectionStatus::Ended,
        };
        assert_eq!(e.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            e.to_string(),
            "cannot cast a vote while the election is in status ended"
        );
        let e = StoreError::NotFound {
            entity: Entity::Candidate,
            id: "c1".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::NotFound);
        assert_eq!(e.to_string(), "candidate c1 not found");
    }

    #[test]
    fn leader_needs_a_vote() {
        let c = Candidate {
            id: CandidateId::from("c"),
            name: "C".to_string(),
            number: 1,
            party: String::new(),
        };
        let mut tally = Tally {
            total_votes: 0,
            rows: vec![TallyRow {
                candidate: c,
                votes: 0,
                percentage: 0.0,
            }],
        };
        assert!(tally.leader().is_none());
        tally.rows[0].votes = 1;
        tally.total_votes = 1;
        assert_eq!(tally.leader().map(|r| r.candidate.number), Some(1));
    }
}
