use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{debug, info, warn};
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Writer,
};

use crate::{
    config::{ExportSpec, ExportTarget, SamplerConfig},
    error::{Result, SampleError},
    reader::OsmReader,
    utils::{ensure_directory, partial_path},
    TagFilter,
};

/// Outcome of a single successful export pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub destination: PathBuf,
    pub stride: NonZeroUsize,
    /// Elements in the source that matched the tag filter.
    pub matched: usize,
    /// Elements written to the destination.
    pub written: usize,
}

pub struct Sampler {
    reader: OsmReader,
    tags: TagFilter,
    exports: ExportSpec,
    output_dir: PathBuf,
}

impl Sampler {
    /// Validates `config` and opens `source`.
    ///
    /// Every check runs here, before any output file is touched. With
    /// `validate_tags` set this reads the whole source once.
    pub fn new(source: impl AsRef<Path>, config: SamplerConfig) -> Result<Self> {
        let tags = TagFilter::new(config.tags)?;
        let exports = ExportSpec::from_parts(config.export_files, config.export_strides)?;
        let output_dir = config
            .output_root
            .unwrap_or_else(|| config.resource_dir.clone());
        ensure_directory(&output_dir)?;

        let mut reader = OsmReader::open(&config.resource_dir, source)?;
        if config.validate_tags {
            reader.discover_tags()?.check(&tags)?;
        }

        Ok(Sampler {
            reader,
            tags,
            exports,
            output_dir,
        })
    }

    pub fn exports(&self) -> &ExportSpec {
        &self.exports
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes every `stride`-th matching element to the target file.
    ///
    /// The document is assembled next to the destination and only moved into
    /// place once the source was read to the end. The reader is rewound
    /// whatever the outcome.
    pub fn export_one(&mut self, target: &ExportTarget) -> Result<ExportReport> {
        let destination = self.output_dir.join(target.file());
        let partial = partial_path(&destination);
        let start = Instant::now();

        let written = self.write_sample(&partial, target.stride());
        let rewound = self.reader.rewind();

        let (matched, written) = match written {
            Ok(counts) => counts,
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    warn!("could not remove {}: {}", partial.display(), cleanup);
                }
                return Err(err);
            }
        };
        rewound?;
        fs::rename(&partial, &destination)?;

        info!(
            "[PASSED] Created {} successfully ({} of {} elements, {:?})",
            target.file().display(),
            written,
            matched,
            start.elapsed()
        );
        Ok(ExportReport {
            destination,
            stride: target.stride(),
            matched,
            written,
        })
    }

    /// Runs [`export_one`] for each target in order, stopping at the first
    /// failure. Files written before the failure stay on disk and are named
    /// in the returned error.
    ///
    /// [`export_one`]: Sampler::export_one
    pub fn export_all(&mut self) -> Result<Vec<ExportReport>> {
        let exports = self.exports.clone();
        let mut reports = Vec::with_capacity(exports.len());
        for target in exports.iter() {
            match self.export_one(target) {
                Ok(report) => reports.push(report),
                Err(err) => {
                    return Err(SampleError::Export {
                        destination: self.output_dir.join(target.file()),
                        completed: reports.into_iter().map(|report| report.destination).collect(),
                        source: Box::new(err),
                    })
                }
            }
        }
        Ok(reports)
    }

    fn write_sample(&mut self, path: &Path, stride: NonZeroUsize) -> Result<(usize, usize)> {
        debug!("sampling every {} element(s) into {}", stride, path.display());
        let mut writer = Writer::new(BufWriter::new(File::create(path)?));
        let root = self.reader.root_tag().to_string();

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|err| SampleError::xml(0, err))?;
        writer.get_mut().write_all(b"\n")?;
        writer
            .write_event(Event::Start(BytesStart::new(root.as_str())))
            .map_err(|err| SampleError::xml(0, err))?;
        writer.get_mut().write_all(b"\n")?;

        let mut matched = 0;
        let mut written = 0;
        for element in self.reader.elements(&self.tags) {
            let element = element?;
            if matched % stride.get() == 0 {
                let out = writer.get_mut();
                out.write_all(b"  ")?;
                out.write_all(element.as_bytes())?;
                out.write_all(b"\n")?;
                written += 1;
            }
            matched += 1;
        }

        writer
            .write_event(Event::End(BytesEnd::new(root.as_str())))
            .map_err(|err| SampleError::xml(0, err))?;
        writer.get_mut().write_all(b"\n")?;
        writer.into_inner().flush()?;
        Ok((matched, written))
    }
}
