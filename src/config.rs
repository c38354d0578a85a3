use std::{
    collections::HashSet,
    fs::File,
    io::BufReader,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    error::{Result, SampleError},
    utils::ensure_osm_extension,
};

/// One output file and the sampling stride used to fill it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    file: PathBuf,
    stride: NonZeroUsize,
}

impl ExportTarget {
    pub fn new(file: impl Into<PathBuf>, stride: usize) -> Result<Self> {
        let file = file.into();
        ensure_osm_extension(&file)?;
        let stride = NonZeroUsize::new(stride).ok_or_else(|| {
            SampleError::Validation(format!("stride for {} must be at least 1", file.display()))
        })?;
        Ok(ExportTarget { file, stride })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn stride(&self) -> NonZeroUsize {
        self.stride
    }
}

/// Export targets in the order they are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSpec(Vec<ExportTarget>);

impl ExportSpec {
    pub fn new(targets: Vec<ExportTarget>) -> Result<Self> {
        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target.file()) {
                return Err(SampleError::Validation(format!(
                    "{} is listed more than once",
                    target.file().display()
                )));
            }
        }
        Ok(ExportSpec(targets))
    }

    /// Pairs the i-th file with the i-th stride.
    ///
    /// Both lists must be given together; leaving both out yields an empty
    /// spec.
    pub fn from_parts(files: Option<Vec<String>>, strides: Option<Vec<usize>>) -> Result<Self> {
        match (files, strides) {
            (None, None) => Ok(ExportSpec::default()),
            (Some(_), None) => Err(SampleError::Validation(
                "export files were given without strides".to_string(),
            )),
            (None, Some(_)) => Err(SampleError::Validation(
                "export strides were given without files".to_string(),
            )),
            (Some(files), Some(strides)) => {
                if files.len() != strides.len() {
                    return Err(SampleError::Validation(format!(
                        "{} export files but {} strides",
                        files.len(),
                        strides.len()
                    )));
                }
                let targets = files
                    .into_iter()
                    .zip(strides)
                    .map(|(file, stride)| ExportTarget::new(file, stride))
                    .collect::<Result<Vec<_>>>()?;
                ExportSpec::new(targets)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExportTarget> {
        self.0.iter()
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Directory the source name is resolved against.
    pub resource_dir: PathBuf,
    /// Where output files go; the resource directory when unset.
    pub output_root: Option<PathBuf>,
    pub tags: Vec<String>,
    pub export_files: Option<Vec<String>>,
    pub export_strides: Option<Vec<usize>>,
    /// Scan the whole source up front and reject tags it never uses.
    pub validate_tags: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            resource_dir: PathBuf::from("."),
            output_root: None,
            tags: Vec::new(),
            export_files: None,
            export_strides: None,
            validate_tags: false,
        }
    }
}

/// A sampling run described in an XML plan file:
///
/// ```xml
/// <plan source="gurugram.osm" resource-dir="res" validate-tags="true">
///   <tag>node</tag>
///   <file>data10.osm</file>
///   <stride>10</stride>
/// </plan>
/// ```
#[derive(Debug, Deserialize)]
pub struct SamplerPlan {
    #[serde(rename = "@source")]
    pub source: String,
    #[serde(rename = "@resource-dir")]
    pub resource_dir: Option<PathBuf>,
    #[serde(rename = "@output-root")]
    pub output_root: Option<PathBuf>,
    #[serde(rename = "@validate-tags", default)]
    pub validate_tags: bool,
    #[serde(default)]
    pub tag: Vec<String>,
    #[serde(default)]
    pub file: Vec<String>,
    #[serde(default)]
    pub stride: Vec<usize>,
}

impl SamplerPlan {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let buffer = BufReader::new(File::open(path)?);
        Ok(quick_xml::de::from_reader(buffer)?)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Splits the plan into the source name and the sampler configuration.
    pub fn into_config(self) -> (String, SamplerConfig) {
        let defaults = SamplerConfig::default();
        let config = SamplerConfig {
            resource_dir: self.resource_dir.unwrap_or(defaults.resource_dir),
            output_root: self.output_root,
            tags: self.tag,
            export_files: (!self.file.is_empty()).then_some(self.file),
            export_strides: (!self.stride.is_empty()).then_some(self.stride),
            validate_tags: self.validate_tags,
        };
        (self.source, config)
    }
}
