#![cfg(not(tarpaulin_include))]

use anyhow::{Context, bail};
use log::info;
use partitioner::dataset::Dataset;
use partitioner::export::write_csv;
use partitioner::partition::PartitionJob;
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

struct Args {
    file: String,
    num_groups: u64,
    columns: Vec<String>,
    output: Option<PathBuf>,
}

fn parse_args(raw: &[String]) -> anyhow::Result<Args> {
    let mut positional = Vec::new();
    let mut output = None;

    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        if arg == "--output" || arg == "-o" {
            let path = iter.next().context("--output needs a path")?;
            output = Some(PathBuf::from(path));
        } else {
            positional.push(arg.clone());
        }
    }

    if positional.len() < 2 {
        bail!("expected <file> <groups> <column>...");
    }
    let file = positional.remove(0);
    let groups = positional.remove(0);
    let num_groups = groups
        .trim()
        .parse::<u64>()
        .with_context(|| format!("number of groups must be an integer, got {:?}", groups))?;

    Ok(Args {
        file,
        num_groups,
        columns: positional,
        output,
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let raw: Vec<String> = env::args().collect();
    let program = raw.first().map(String::as_str).unwrap_or("partition-cli");
    let args = match parse_args(raw.get(1..).unwrap_or(&[])) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!(
                "Usage: {} <file.csv> <groups> <column>... [--output <grouped.csv>]",
                program
            );
            std::process::exit(2);
        }
    };

    let started = Instant::now();
    let job = PartitionJob::new(&args.file, args.num_groups, &args.columns)?;
    let dataset = Dataset::from_path(&args.file)
        .with_context(|| format!("failed to load {}", args.file))?;
    info!(
        "Loaded {} rows x {} columns from {}",
        dataset.row_count(),
        dataset.columns.len(),
        args.file
    );

    let report = job.run(&dataset)?;
    print!("{}", report.log);

    if let Some(path) = &args.output {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        write_csv(&dataset, &report, BufWriter::new(file))
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote grouped rows to {}", path.display());
    }

    info!("Total elapsed time: {:.1} seconds", started.elapsed().as_secs_f64());
    Ok(())
}
