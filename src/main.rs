mod args;
mod ballot_box;

use clap::Parser;
use log::debug;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("args: {:?}", args);

    if let Err(e) = ballot_box::run(&args) {
        eprintln!("{}", ballot_box::error_report(&e));
        std::process::exit(1);
    }
}
