use clap::{Arg, Command, arg, value_parser};

use tbx_core::models::IndexFormat;

pub const QUERY_CMD: &str = "query";

pub fn create_query_cli() -> Command {
    Command::new(QUERY_CMD)
        .about("Print the rows of a chromosome, optionally limited to [begin, end).")
        .arg_required_else_help(true)
        .arg(Arg::new("input").required(true).help("The bgzipped file or one of its index files"))
        .arg(Arg::new("chrom").required(true).help("Chromosome to print"))
        .arg(arg!(-b --begin <begin> "First position to print").value_parser(value_parser!(u64)))
        .arg(arg!(-e --end <end> "Stop before this position").value_parser(value_parser!(u64)))
        .arg(
            arg!(-f --format <format> "Index flavour to query through")
                .value_parser(value_parser!(IndexFormat))
                .default_value("TBJ"),
        )
        .arg(arg!(--fields "Print each row as its list of columns"))
}
