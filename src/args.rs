use clap::{Parser, Subcommand};

/// This is an election manager: create elections, register candidates, record votes and
/// follow the results.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. See the manual of election_store for
    /// the accepted keys.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, optional) The directory holding the elections. Setting this option overrides
    /// the directory that may be specified with the --config option. Defaults to the current
    /// directory.
    #[clap(short, long, value_parser)]
    pub store: Option<String>,

    /// If passed as an argument, lists, election details and results are printed as JSON.
    #[clap(long, global = true, takes_value = false)]
    pub json: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, global = true, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

/// Elections and candidates are given by id, or by the first characters of their id.
/// Candidates may also be given by ballot number.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Creates a new election. Candidates can be added to it until it ends.
    Create {
        #[clap(value_parser)]
        name: String,
        #[clap(short, long, value_parser, default_value = "")]
        description: String,
    },
    /// Lists all the elections.
    List,
    /// Shows an election, its candidates and its results.
    Show {
        #[clap(value_parser)]
        election: String,
    },
    /// Deletes an election and all its votes.
    Delete {
        #[clap(value_parser)]
        election: String,
    },
    /// Registers a candidate with a ballot number that is unique in the election.
    AddCandidate {
        #[clap(value_parser)]
        election: String,
        #[clap(value_parser)]
        name: String,
        #[clap(short, long, value_parser, allow_hyphen_values = true)]
        number: i64,
        #[clap(short, long, value_parser, default_value = "")]
        party: String,
    },
    /// Removes a candidate and its votes.
    RemoveCandidate {
        #[clap(value_parser)]
        election: String,
        #[clap(value_parser)]
        candidate: String,
    },
    /// Opens the voting window.
    Start {
        #[clap(value_parser)]
        election: String,
    },
    /// Closes the voting window. This cannot be undone.
    End {
        #[clap(value_parser)]
        election: String,
    },
    /// Records one vote for a candidate.
    Vote {
        #[clap(value_parser)]
        election: String,
        #[clap(value_parser)]
        candidate: String,
    },
    /// Prints the results of an election.
    Results {
        #[clap(value_parser)]
        election: String,
        /// (seconds, optional) Prints the results again at this interval for as long as the
        /// election is open for voting.
        #[clap(long, value_parser)]
        refresh: Option<u64>,
    },
}
