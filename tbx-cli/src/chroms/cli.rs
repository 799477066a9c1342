use clap::{Arg, Command, arg, value_parser};

use tbx_core::models::IndexFormat;

pub const CHROMS_CMD: &str = "chroms";

pub fn create_chroms_cli() -> Command {
    Command::new(CHROMS_CMD)
        .about("List the chromosomes of an index and the column count of the file.")
        .arg_required_else_help(true)
        .arg(Arg::new("input").required(true).help("The bgzipped file or one of its index files"))
        .arg(
            arg!(-f --format <format> "Index flavour to read")
                .value_parser(value_parser!(IndexFormat))
                .default_value("TBJ"),
        )
}
