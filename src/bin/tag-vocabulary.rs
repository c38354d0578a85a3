use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use env_logger::Env;
use log::error;
use osm_sampler::OsmReader;

/// Lists every element name used in an OSM XML extract with its count.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    source: String,

    #[arg(long, default_value = ".")]
    resource_dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let vocabulary = OsmReader::open(&args.resource_dir, &args.source)
        .and_then(|mut reader| reader.discover_tags());
    match vocabulary {
        Ok(vocabulary) => {
            for (tag, count) in vocabulary.iter() {
                println!("{tag}\t{count}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
