use anyhow::{Context, Result};
use clap::ArgMatches;

use tbx_core::models::IndexFormat;
use tbx_index::Tabix;

pub fn run_chroms(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .expect("A path to a bgzipped file is required.");

    let format = matches.get_one::<IndexFormat>("format").copied().unwrap_or_default();

    let tabix = Tabix::open(input, format).with_context(|| format!("Failed to load the {format} index of {input}"))?;

    for chrom in tabix.chromosomes()? {
        println!("{chrom}");
    }
    println!("columns\t{}", tabix.num_columns()?);

    Ok(())
}
