use log::{debug, info};

use election_store::*;
use snafu::{prelude::*, ErrorCompat};

use std::thread;
use std::time::Duration;

use serde_json::Value as JSValue;

use crate::args::{Args, Command};
use crate::ballot_box::config_reader::*;

pub mod config_reader;
mod render;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BallotBoxError {
    #[snafu(display("Election store error"))]
    Store { source: StoreError },

    #[snafu(display("Error opening config file {path}"))]
    OpeningConfig {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing config file {path}"))]
    ParsingConfig {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid config file {path}: {reason}"))]
    InvalidConfig { path: String, reason: String },

    #[snafu(display("No election matches {reference:?}"))]
    UnknownElection { reference: String },
    #[snafu(display("Several elections match {reference:?}, use more characters of the id"))]
    AmbiguousElection { reference: String },
    #[snafu(display("No candidate matches {reference:?} in election {election}"))]
    UnknownCandidate {
        reference: String,
        election: String,
    },
    #[snafu(display("Several candidates match {reference:?}, use more characters of the id"))]
    AmbiguousCandidate { reference: String },

    #[snafu(display("Error writing JSON output"))]
    WritingJson { source: serde_json::Error },
}

impl From<StoreError> for BallotBoxError {
    fn from(source: StoreError) -> Self {
        BallotBoxError::Store { source }
    }
}

pub type BallotBoxResult<T> = Result<T, BallotBoxError>;

/// The error followed by each of its causes, one per line.
pub fn error_report(e: &BallotBoxError) -> String {
    let mut s = format!("Error: {}", e);
    for cause in ErrorCompat::iter_chain(e).skip(1) {
        s.push_str(&format!("\n  caused by: {}", cause));
    }
    s
}

enum Lookup<'a> {
    Found(&'a str),
    Missing,
    Ambiguous,
}

// An exact id, or else the only id starting with the reference.
fn lookup<'a>(ids: impl Iterator<Item = &'a str>, reference: &str) -> Lookup<'a> {
    if reference.is_empty() {
        return Lookup::Missing;
    }
    let matches: Vec<&'a str> = ids.filter(|id| id.starts_with(reference)).collect();
    if let Some(id) = matches.iter().find(|id| **id == reference) {
        return Lookup::Found(*id);
    }
    match matches.as_slice() {
        [id] => Lookup::Found(*id),
        [] => Lookup::Missing,
        _ => Lookup::Ambiguous,
    }
}

pub fn resolve_election<S: Storage>(
    store: &ElectionStore<S>,
    reference: &str,
) -> BallotBoxResult<ElectionId> {
    let ids = store.elections().iter().map(|e| e.id().as_str());
    match lookup(ids, reference) {
        Lookup::Found(id) => Ok(ElectionId::from(id)),
        Lookup::Missing => UnknownElectionSnafu { reference }.fail(),
        Lookup::Ambiguous => AmbiguousElectionSnafu { reference }.fail(),
    }
}

/// Ballot numbers are tried first, then candidate ids.
pub fn resolve_candidate(election: &Election, reference: &str) -> BallotBoxResult<CandidateId> {
    if let Ok(number) = reference.parse::<u32>() {
        if let Some(c) = election.candidate_by_number(number) {
            return Ok(c.id.clone());
        }
    }
    let ids = election.candidates().iter().map(|c| c.id.as_str());
    match lookup(ids, reference) {
        Lookup::Found(id) => Ok(CandidateId::from(id)),
        Lookup::Missing => UnknownCandidateSnafu {
            reference,
            election: election.name(),
        }
        .fail(),
        Lookup::Ambiguous => AmbiguousCandidateSnafu { reference }.fail(),
    }
}

fn print_view(json: bool, text: String, js: JSValue) -> BallotBoxResult<()> {
    if json {
        let pretty = serde_json::to_string_pretty(&js).context(WritingJsonSnafu {})?;
        println!("{}", pretty);
    } else {
        print!("{}", text);
    }
    Ok(())
}

fn watch_results<S: Storage>(
    store: &mut ElectionStore<S>,
    id: &ElectionId,
    refresh: Option<u64>,
    json: bool,
) -> BallotBoxResult<()> {
    loop {
        let election = store.election(id)?;
        let tally = election.tally();
        print_view(json, render::results_text(&tally), render::results_json(&tally))?;
        match refresh {
            Some(secs) if election.status().accepts_votes() => {
                thread::sleep(Duration::from_secs(secs.max(1)));
                store.reload()?;
                if !json {
                    println!();
                }
            }
            _ => return Ok(()),
        }
    }
}

/// Runs one command against the store on disk.
pub fn run_command<S: Storage>(
    store: &mut ElectionStore<S>,
    command: &Command,
    json: bool,
) -> BallotBoxResult<()> {
    match command {
        Command::Create { name, description } => {
            let e = store.create_election(name, description)?;
            println!("Created election {:?} with id {}", e.name(), e.id());
        }
        Command::List => {
            let summaries = store.summaries();
            print_view(
                json,
                render::list_text(&summaries),
                render::list_json(&summaries),
            )?;
        }
        Command::Show { election } => {
            let id = resolve_election(store, election)?;
            let e = store.election(&id)?;
            print_view(json, render::election_text(e), render::election_json(e))?;
        }
        Command::Delete { election } => {
            let id = resolve_election(store, election)?;
            let removed = store.delete_election(&id)?;
            println!("Deleted election {:?}", removed.name());
        }
        Command::AddCandidate {
            election,
            name,
            number,
            party,
        } => {
            let id = resolve_election(store, election)?;
            let c = store.add_candidate(&id, name, *number, party)?;
            println!("Added candidate #{} {} with id {}", c.number, c.name, c.id);
        }
        Command::RemoveCandidate {
            election,
            candidate,
        } => {
            let id = resolve_election(store, election)?;
            let cid = resolve_candidate(store.election(&id)?, candidate)?;
            let c = store.remove_candidate(&id, &cid)?;
            println!("Removed candidate #{} {}", c.number, c.name);
        }
        Command::Start { election } => {
            let id = resolve_election(store, election)?;
            store.start_voting(&id)?;
            println!("Voting is open");
        }
        Command::End { election } => {
            let id = resolve_election(store, election)?;
            store.end_voting(&id)?;
            println!("Voting is closed");
        }
        Command::Vote {
            election,
            candidate,
        } => {
            let id = resolve_election(store, election)?;
            let cid = resolve_candidate(store.election(&id)?, candidate)?;
            let count = store.cast_vote(&id, &cid)?;
            let e = store.election(&id)?;
            if let Some(c) = e.candidate(&cid) {
                println!("Vote recorded for #{} {} ({} votes)", c.number, c.name, count);
            }
        }
        Command::Results { election, refresh } => {
            let id = resolve_election(store, election)?;
            watch_results(store, &id, *refresh, json)?;
        }
    }
    Ok(())
}

pub fn run(args: &Args) -> BallotBoxResult<()> {
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => BallotBoxConfig::default(),
    };
    let dir = config.store_directory(args.store.as_deref());
    let settings = config.store_settings();
    info!("Using store {:?} in {}", settings.slot, dir.display());
    let mut store = ElectionStore::open(FileStorage::new(dir), settings)?;
    debug!("command: {:?}", args.command);
    run_command(&mut store, &args.command, args.json)
}
