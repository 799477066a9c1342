use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::debug;

use tbx_core::models::IndexFormat;
use tbx_index::Tabix;
use tbx_io::Row;

pub fn run_query(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .expect("A path to a bgzipped file is required.");

    let chrom = matches
        .get_one::<String>("chrom")
        .expect("A chromosome is required.");

    let begin = matches.get_one::<u64>("begin").copied();
    let end = matches.get_one::<u64>("end").copied();
    let format = matches.get_one::<IndexFormat>("format").copied().unwrap_or_default();
    let as_line = !matches.get_flag("fields");

    let tabix = Tabix::open(input, format).with_context(|| format!("Failed to load the {format} index of {input}"))?;
    let rows = tabix
        .iter_range(chrom, begin, end, as_line)
        .with_context(|| format!("Failed to query {chrom}"))?;

    let mut out = BufWriter::new(io::stdout().lock());
    let mut count = 0usize;
    for row in rows {
        match row? {
            Row::Line(line) => writeln!(out, "{line}")?,
            Row::Fields(fields) => writeln!(out, "{fields:?}")?,
        }
        count += 1;
    }
    out.flush()?;

    debug!("{count} rows of {chrom} in [{begin:?}, {end:?})");
    Ok(())
}
