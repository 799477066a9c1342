use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use tbx_core::models::IndexFormat;
use tbx_index::Tabix;

pub fn run_create(matches: &ArgMatches) -> Result<()> {
    let format = *matches
        .get_one::<IndexFormat>("format")
        .expect("An index format is required.");

    let input = matches
        .get_one::<String>("input")
        .expect("A path to a bgzipped file is required.");

    let overwrite = !matches.get_flag("no-overwrite");
    let compress = !matches.get_flag("no-compress");

    let mut tabix = Tabix::new(input, format);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Building {format} index for {input}"));

    let res = tabix.create(overwrite, compress);
    pb.finish_and_clear();
    res.with_context(|| format!("Failed to create the {format} index of {input}"))?;

    info!("wrote {}", tabix.index_path().display());
    println!("{}", tabix.index_path().display());

    Ok(())
}
