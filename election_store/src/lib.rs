/*!
Elections, candidates and votes, kept in a single persisted collection.

An [`ElectionStore`] owns every election. Each change is checked against the
lifecycle of the election (`setup` -> `voting` -> `ended`), applied, and the
whole collection is written back to its [`Storage`] slot before the call
returns. A call that fails changes nothing.

```
use election_store::{ElectionStore, MemoryStorage, StoreSettings};
# use election_store::StoreError;

let mut store = ElectionStore::open(MemoryStorage::new(), StoreSettings::default())?;
let id = store.create_election("Class president", "Spring term")?.id().clone();

let anna = store.add_candidate(&id, "Anna", 1, "")?;
store.add_candidate(&id, "Bob", 2, "Blue")?;
store.start_voting(&id)?;
store.cast_vote(&id, &anna.id)?;

let tally = store.tally(&id)?;
assert_eq!(tally.total_votes, 1);
assert_eq!(tally.leader().map(|r| r.candidate.name.as_str()), Some("Anna"));
# Ok::<(), StoreError>(())
```

See the [manual] for the stored layout.
*/

mod config;
mod election;
pub mod manual;
pub mod storage;

use log::{debug, info};
use snafu::prelude::*;

pub use crate::config::*;
pub use crate::election::Election;
pub use crate::storage::{FileStorage, MemoryStorage, Storage};

/// The collection of all the elections, mirrored to a storage slot.
#[derive(Debug)]
pub struct ElectionStore<S: Storage> {
    storage: S,
    settings: StoreSettings,
    elections: Vec<Election>,
}

impl<S: Storage> ElectionStore<S> {
    /// Loads the collection from the slot named in the settings.
    ///
    /// A slot that was never written holds no elections.
    pub fn open(storage: S, settings: StoreSettings) -> StoreResult<ElectionStore<S>> {
        let elections = load_elections(&storage, &settings.slot)?;
        info!(
            "Opened slot {:?} with {} elections",
            settings.slot,
            elections.len()
        );
        Ok(ElectionStore {
            storage,
            settings,
            elections,
        })
    }

    /// Reads the slot again, dropping the in-memory state.
    ///
    /// Useful when another process writes to the same slot.
    pub fn reload(&mut self) -> StoreResult<()> {
        self.elections = load_elections(&self.storage, &self.settings.slot)?;
        debug!("reload: {} elections", self.elections.len());
        Ok(())
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// All the elections, in creation order.
    pub fn elections(&self) -> &[Election] {
        self.elections.as_slice()
    }

    pub fn summaries(&self) -> Vec<ElectionSummary> {
        self.elections.iter().map(|e| e.summary()).collect()
    }

    /// Looks up an election.
    pub fn election(&self, id: &ElectionId) -> StoreResult<&Election> {
        self.elections
            .iter()
            .find(|e| e.id() == id)
            .context(NotFoundSnafu {
                entity: Entity::Election,
                id: id.as_str(),
            })
    }

    /// Focuses on one election for a series of operations.
    pub fn session(&mut self, id: &ElectionId) -> StoreResult<Session<'_, S>> {
        self.election(id)?;
        Ok(Session {
            store: self,
            election: id.clone(),
        })
    }

    pub fn create_election(&mut self, name: &str, description: &str) -> StoreResult<Election> {
        let election = Election::new(name, description)?;
        let mut view: Vec<&Election> = self.elections.iter().collect();
        view.push(&election);
        persist(&mut self.storage, &self.settings, &view)?;
        info!("Created election {} ({:?})", election.id(), election.name());
        self.elections.push(election.clone());
        Ok(election)
    }

    /// Removes an election and returns it.
    pub fn delete_election(&mut self, id: &ElectionId) -> StoreResult<Election> {
        let idx = self.position(id)?;
        let view: Vec<&Election> = self
            .elections
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, e)| e)
            .collect();
        persist(&mut self.storage, &self.settings, &view)?;
        let removed = self.elections.remove(idx);
        info!("Deleted election {} ({:?})", removed.id(), removed.name());
        Ok(removed)
    }

    pub fn add_candidate(
        &mut self,
        election: &ElectionId,
        name: &str,
        number: i64,
        party: &str,
    ) -> StoreResult<Candidate> {
        self.update(election, |e| e.add_candidate(name, number, party))
    }

    pub fn remove_candidate(
        &mut self,
        election: &ElectionId,
        candidate: &CandidateId,
    ) -> StoreResult<Candidate> {
        self.update(election, |e| e.remove_candidate(candidate))
    }

    pub fn start_voting(&mut self, election: &ElectionId) -> StoreResult<()> {
        self.update(election, |e| e.start_voting())?;
        info!("Voting started for election {}", election);
        Ok(())
    }

    pub fn end_voting(&mut self, election: &ElectionId) -> StoreResult<()> {
        self.update(election, |e| e.end_voting())?;
        info!("Voting ended for election {}", election);
        Ok(())
    }

    /// Records one vote and returns the new count of the candidate.
    pub fn cast_vote(&mut self, election: &ElectionId, candidate: &CandidateId) -> StoreResult<u64> {
        self.update(election, |e| e.cast_vote(candidate))
    }

    pub fn tally(&self, election: &ElectionId) -> StoreResult<Tally> {
        Ok(self.election(election)?.tally())
    }

    fn position(&self, id: &ElectionId) -> StoreResult<usize> {
        self.elections
            .iter()
            .position(|e| e.id() == id)
            .context(NotFoundSnafu {
                entity: Entity::Election,
                id: id.as_str(),
            })
    }

    // The operation runs on a copy. The copy replaces the original only once
    // the collection including it has been written.
    fn update<T>(
        &mut self,
        id: &ElectionId,
        op: impl FnOnce(&mut Election) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let idx = self.position(id)?;
        let mut updated = self.elections[idx].clone();
        let res = op(&mut updated)?;
        let view: Vec<&Election> = self
            .elections
            .iter()
            .enumerate()
            .map(|(i, e)| if i == idx { &updated } else { e })
            .collect();
        persist(&mut self.storage, &self.settings, &view)?;
        self.elections[idx] = updated;
        Ok(res)
    }
}

/// A store focused on one election, like a page showing that election.
pub struct Session<'a, S: Storage> {
    store: &'a mut ElectionStore<S>,
    election: ElectionId,
}

impl<'a, S: Storage> Session<'a, S> {
    pub fn election_id(&self) -> &ElectionId {
        &self.election
    }

    pub fn election(&self) -> StoreResult<&Election> {
        self.store.election(&self.election)
    }

    pub fn add_candidate(&mut self, name: &str, number: i64, party: &str) -> StoreResult<Candidate> {
        self.store.add_candidate(&self.election, name, number, party)
    }

    pub fn remove_candidate(&mut self, candidate: &CandidateId) -> StoreResult<Candidate> {
        self.store.remove_candidate(&self.election, candidate)
    }

    pub fn start_voting(&mut self) -> StoreResult<()> {
        self.store.start_voting(&self.election)
    }

    pub fn end_voting(&mut self) -> StoreResult<()> {
        self.store.end_voting(&self.election)
    }

    pub fn cast_vote(&mut self, candidate: &CandidateId) -> StoreResult<u64> {
        self.store.cast_vote(&self.election, candidate)
    }

    pub fn tally(&self) -> StoreResult<Tally> {
        self.store.tally(&self.election)
    }
}

fn load_elections<S: Storage>(storage: &S, slot: &str) -> StoreResult<Vec<Election>> {
    let contents = match storage.read_slot(slot).context(ReadSlotSnafu { slot })? {
        Some(c) if !c.trim().is_empty() => c,
        _ => {
            debug!("load_elections: slot {:?} is empty", slot);
            return Ok(Vec::new());
        }
    };
    let elections: Option<Vec<Election>> =
        serde_json::from_str(&contents).context(DecodeSnafu { slot })?;
    Ok(elections.unwrap_or_default())
}

fn persist<S: Storage>(
    storage: &mut S,
    settings: &StoreSettings,
    elections: &[&Election],
) -> StoreResult<()> {
    let contents = if settings.pretty_print {
        serde_json::to_string_pretty(elections)
    } else {
        serde_json::to_string(elections)
    }
    .context(EncodeSnafu {})?;
    storage
        .write_slot(&settings.slot, &contents)
        .context(WriteSlotSnafu {
            slot: settings.slot.as_str(),
        })?;
    debug!(
        "persist: {} elections, {} bytes",
        elections.len(),
        contents.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn memory_store() -> ElectionStore<MemoryStorage> {
        init();
        ElectionStore::open(MemoryStorage::new(), StoreSettings::default()).unwrap()
    }

    fn reopen(store: ElectionStore<MemoryStorage>) -> ElectionStore<MemoryStorage> {
        let settings = store.settings().clone();
        ElectionStore::open(store.into_storage(), settings).unwrap()
    }

    /// Accepts writes until told otherwise.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        broken: bool,
    }

    impl Storage for FlakyStorage {
        fn read_slot(&self, slot: &str) -> io::Result<Option<String>> {
            self.inner.read_slot(slot)
        }

        fn write_slot(&mut self, slot: &str, contents: &str) -> io::Result<()> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::Other, "quota exceeded"));
            }
            self.inner.write_slot(slot, contents)
        }
    }

    #[test]
    fn empty_slots() {
        init();
        for contents in [None, Some(""), Some("  \n"), Some("null"), Some("[]")] {
            let storage = match contents {
                Some(c) => MemoryStorage::with_slot("elections", c),
                None => MemoryStorage::new(),
            };
            let store = ElectionStore::open(storage, StoreSettings::default()).unwrap();
            assert!(store.elections().is_empty());
        }
    }

    #[test]
    fn garbage_slot() {
        init();
        let storage = MemoryStorage::with_slot("elections", "{not json");
        let err = ElectionStore::open(storage, StoreSettings::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[test]
    fn old_ballot_numbers_do_not_block_the_collection() {
        init();
        let slot = r#"[
            {"id": "1", "name": "Old", "status": "ended", "createdAt": "2023-05-01T08:00:00Z",
             "candidates": [{"id": "x", "name": "X", "number": -2, "votes": 1},
                            {"id": "y", "name": "Y", "number": 3, "votes": 2}],
             "votes": {"x": 1, "y": 2}},
            {"id": "2", "name": "New", "status": "setup", "createdAt": "2024-05-01T08:00:00Z"}
        ]"#;
        let storage = MemoryStorage::with_slot("elections", slot);
        let store = ElectionStore::open(storage, StoreSettings::default()).unwrap();
        assert_eq!(store.elections().len(), 2);
        let old = store.election(&ElectionId::from("1")).unwrap();
        assert_eq!(old.candidate_count(), 1);
        assert_eq!(old.total_votes(), 2);
        assert_eq!(store.elections()[1].name(), "New");
    }

    #[test]
    fn create_persists_immediately() {
        let mut store = memory_store();
        let e = store.create_election("Board", "").unwrap();
        assert!(store.storage().slot("elections").unwrap().contains(e.id().as_str()));
        let store = reopen(store);
        assert_eq!(store.elections(), &[e]);
    }

    #[test]
    fn blank_election_name() {
        let mut store = memory_store();
        store.create_election("Board", "").unwrap();
        let before = store.storage().clone();
        let err = store.create_election("   ", "desc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.elections().len(), 1);
        assert_eq!(store.storage(), &before);
    }

    #[test]
    fn open_and_delete() {
        let mut store = memory_store();
        let a = store.create_election("A", "").unwrap();
        let b = store.create_election("B", "").unwrap();
        assert_eq!(store.election(b.id()).unwrap().name(), "B");

        let missing = ElectionId::from("missing");
        assert_eq!(store.election(&missing).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            store.delete_election(&missing).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let removed = store.delete_election(a.id()).unwrap();
        assert_eq!(removed.name(), "A");
        let store = reopen(store);
        let names: Vec<&str> = store.elections().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["B"]);
    }

    #[test]
    fn operations_on_unknown_election() {
        let mut store = memory_store();
        let missing = ElectionId::from("missing");
        let cid = CandidateId::from("c");
        for err in [
            store.add_candidate(&missing, "A", 1, "").unwrap_err(),
            store.remove_candidate(&missing, &cid).unwrap_err(),
            store.start_voting(&missing).unwrap_err(),
            store.end_voting(&missing).unwrap_err(),
            store.cast_vote(&missing, &cid).unwrap_err(),
            store.tally(&missing).unwrap_err(),
        ] {
            assert!(matches!(
                err,
                StoreError::NotFound {
                    entity: Entity::Election,
                    ..
                }
            ));
        }
        assert!(store.session(&missing).is_err());
    }

    #[test]
    fn full_lifecycle_survives_reload() {
        let mut store = memory_store();
        let other = store.create_election("Other", "untouched").unwrap();
        let id = store
            .create_election("Class president", "Spring")
            .unwrap()
            .id()
            .clone();
        let a = store.add_candidate(&id, "Anna", 1, "Blue").unwrap();
        let b = store.add_candidate(&id, "Bob", 2, "").unwrap();
        let c = store.add_candidate(&id, "Clara", 3, "").unwrap();
        let d = store.add_candidate(&id, "Dan", 4, "").unwrap();
        store.remove_candidate(&id, &d.id).unwrap();
        store.start_voting(&id).unwrap();
        for cid in [&b.id, &a.id, &c.id, &a.id, &b.id, &a.id, &b.id] {
            store.cast_vote(&id, cid).unwrap();
        }

        let before: Vec<Election> = store.elections().to_vec();
        let mut store = reopen(store);
        assert_eq!(store.elections(), before.as_slice());
        assert_eq!(store.election(other.id()).unwrap(), &other);

        let tally = store.tally(&id).unwrap();
        let rows: Vec<(&str, u64, f64)> = tally
            .rows
            .iter()
            .map(|r| (r.candidate.name.as_str(), r.votes, r.percentage))
            .collect();
        assert_eq!(
            rows,
            vec![("Anna", 3, 42.9), ("Bob", 3, 42.9), ("Clara", 1, 14.3)]
        );

        store.end_voting(&id).unwrap();
        let store = reopen(store);
        assert_eq!(store.election(&id).unwrap().status(), ElectionStatus::Ended);
    }

    #[test]
    fn failed_operation_leaves_slot_alone() {
        let mut store = memory_store();
        let id = store.create_election("E", "").unwrap().id().clone();
        store.add_candidate(&id, "A", 1, "").unwrap();
        let slot = store.storage().slot("elections").unwrap().to_string();

        assert_eq!(
            store.add_candidate(&id, "B", 1, "").unwrap_err().kind(),
            ErrorKind::DuplicateNumber
        );
        assert_eq!(
            store.end_voting(&id).unwrap_err().kind(),
            ErrorKind::InvalidTransition
        );
        assert_eq!(store.storage().slot("elections").unwrap(), slot);
    }

    #[test]
    fn write_failure_rolls_back() {
        init();
        let mut store =
            ElectionStore::open(FlakyStorage::default(), StoreSettings::default()).unwrap();
        let id = store.create_election("E", "").unwrap().id().clone();
        let a = store.add_candidate(&id, "A", 1, "").unwrap();
        store.start_voting(&id).unwrap();
        store.cast_vote(&id, &a.id).unwrap();

        store.storage.broken = true;
        let err = store.cast_vote(&id, &a.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(store.create_election("F", "").is_err());
        assert!(store.delete_election(&id).is_err());
        assert!(store.end_voting(&id).is_err());

        let e = store.election(&id).unwrap();
        assert_eq!(e.votes_for(&a.id), Some(1));
        assert_eq!(e.status(), ElectionStatus::Voting);
        assert_eq!(store.elections().len(), 1);

        store.storage.broken = false;
        assert_eq!(store.cast_vote(&id, &a.id).unwrap(), 2);
    }

    #[test]
    fn session_focus() {
        let mut store = memory_store();
        let id = store.create_election("E", "").unwrap().id().clone();
        {
            let mut session = store.session(&id).unwrap();
            assert_eq!(session.election_id(), &id);
            let a = session.add_candidate("A", 1, "").unwrap();
            let b = session.add_candidate("B", 2, "").unwrap();
            session.start_voting().unwrap();
            session.cast_vote(&b.id).unwrap();
            session.cast_vote(&b.id).unwrap();
            session.cast_vote(&a.id).unwrap();
            session.remove_candidate(&a.id).unwrap();
            assert_eq!(session.tally().unwrap().total_votes, 2);
            session.end_voting().unwrap();
            assert_eq!(session.election().unwrap().status(), ElectionStatus::Ended);
        }
        let store = reopen(store);
        assert_eq!(store.election(&id).unwrap().total_votes(), 2);
    }

    #[test]
    fn pretty_slot() {
        init();
        let settings = StoreSettings {
            slot: "my-elections".to_string(),
            pretty_print: true,
        };
        let mut store = ElectionStore::open(MemoryStorage::new(), settings).unwrap();
        store.create_election("E", "").unwrap();
        let slot = store.storage().slot("my-elections").unwrap();
        assert!(slot.contains('\n'));
        assert!(store.storage().slot("elections").is_none());
    }

    #[test]
    fn shared_file_slot() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            ElectionStore::open(FileStorage::new(dir.path()), StoreSettings::default()).unwrap();
        let id = writer.create_election("Kiosk", "").unwrap().id().clone();
        let a = writer.add_candidate(&id, "A", 1, "").unwrap();
        writer.start_voting(&id).unwrap();

        let mut reader =
            ElectionStore::open(FileStorage::new(dir.path()), StoreSettings::default()).unwrap();
        assert_eq!(reader.tally(&id).unwrap().total_votes, 0);

        writer.cast_vote(&id, &a.id).unwrap();
        writer.cast_vote(&id, &a.id).unwrap();
        reader.reload().unwrap();
        assert_eq!(reader.tally(&id).unwrap().total_votes, 2);
        assert_eq!(reader.elections(), writer.elections());
    }

    #[test]
    fn summaries() {
        let mut store = memory_store();
        let id = store.create_election("E", "desc").unwrap().id().clone();
        store.add_candidate(&id, "A", 1, "").unwrap();
        store.create_election("F", "").unwrap();
        let s = store.summaries();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].candidate_count, 1);
        assert_eq!(s[0].description, "desc");
        assert_eq!(s[1].name, "F");
    }
}
