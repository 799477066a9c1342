use clap::{Arg, Command, arg, value_parser};

use tbx_core::models::IndexFormat;

pub const CREATE_CMD: &str = "create";

pub fn create_create_cli() -> Command {
    Command::new(CREATE_CMD)
        .about("Build an index for a bgzipped file and save it next to the file.")
        .arg_required_else_help(true)
        .arg(
            Arg::new("format")
                .required(true)
                .value_parser(value_parser!(IndexFormat))
                .help("Index flavour, TBJ (from the .tbi) or TBK (from a scan of the file)"),
        )
        .arg(Arg::new("input").required(true).help("The bgzipped file or one of its index files"))
        .arg(arg!(--"no-overwrite" "Keep an existing index file"))
        .arg(arg!(--"no-compress" "Write the index without gzip"))
}
