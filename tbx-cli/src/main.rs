mod chroms;
mod create;
mod query;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "tbx";
    pub const BIN_NAME: &str = "tbx";
    pub const VERBOSE_ARG: &str = "verbose";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Build and query TBJ/TBK random-access indexes of bgzipped tabular files.")
        .subcommand_required(true)
        .arg(
            Arg::new(consts::VERBOSE_ARG)
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("More logging, repeat for more (-v info, -vv debug, -vvv trace)"),
        )
        .subcommand(create::cli::create_create_cli())
        .subcommand(query::cli::create_query_cli())
        .subcommand(chroms::cli::create_chroms_cli())
}

/// `warn` by default, each `-v` one level more. `RUST_LOG` wins when set.
fn init_logging(matches: &ArgMatches) {
    let level = match matches.get_count(consts::VERBOSE_ARG) {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let app = build_parser();
    let matches = app.get_matches();

    init_logging(&matches);

    match matches.subcommand() {
        //
        // CREATE
        //
        Some((create::cli::CREATE_CMD, matches)) => {
            create::handlers::run_create(matches)?;
        }

        //
        // QUERY
        //
        Some((query::cli::QUERY_CMD, matches)) => {
            query::handlers::run_query(matches)?;
        }

        //
        // CHROMS
        //
        Some((chroms::cli::CHROMS_CMD, matches)) => {
            chroms::handlers::run_chroms(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
