use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use osm_sampler::{Sampler, SamplerConfig, SamplerPlan};

/// Writes downsampled copies of an OSM XML extract.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Source extract, relative to the resource directory
    #[arg(required_unless_present = "plan")]
    source: Option<String>,

    /// Element tag to keep, repeatable
    #[arg(short, long = "tag")]
    tags: Vec<String>,

    /// Output file name, paired in order with --stride
    #[arg(short = 'o', long = "file")]
    files: Vec<String>,

    /// Keep one of every N matching elements, paired in order with --file
    #[arg(short, long = "stride")]
    strides: Vec<usize>,

    #[arg(long, default_value = ".")]
    resource_dir: PathBuf,

    /// Defaults to the resource directory
    #[arg(long)]
    output_root: Option<PathBuf>,

    /// Scan the whole source first and reject tags it does not contain
    #[arg(long)]
    validate_tags: bool,

    /// Read the whole run from an XML plan file instead
    #[arg(long, conflicts_with_all = ["source", "tags", "files", "strides"])]
    plan: Option<PathBuf>,
}

impl Args {
    fn into_run(self) -> osm_sampler::Result<(String, SamplerConfig)> {
        if let Some(plan) = self.plan {
            return Ok(SamplerPlan::from_path(plan)?.into_config());
        }
        let config = SamplerConfig {
            resource_dir: self.resource_dir,
            output_root: self.output_root,
            tags: self.tags,
            export_files: (!self.files.is_empty()).then_some(self.files),
            export_strides: (!self.strides.is_empty()).then_some(self.strides),
            validate_tags: self.validate_tags,
        };
        Ok((self.source.unwrap_or_default(), config))
    }
}

fn run(args: Args) -> osm_sampler::Result<()> {
    let (source, config) = args.into_run()?;
    let mut sampler = Sampler::new(&source, config)?;
    if sampler.exports().is_empty() {
        info!("{} checked, nothing to export", source);
        return Ok(());
    }
    let reports = sampler.export_all()?;
    info!(
        "wrote {} file(s) to {}",
        reports.len(),
        sampler.output_dir().display()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
