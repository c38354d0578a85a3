pub mod config;
pub mod error;
pub mod reader;
pub mod sampler;
pub mod utils;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::{BTreeMap, BTreeSet};

pub use config::{ExportSpec, ExportTarget, SamplerConfig, SamplerPlan};
pub use error::{ErrorKind, Result, SampleError};
pub use reader::{Elements, OsmReader};
pub use sampler::{ExportReport, Sampler};

pub const ROOT_TAG: &str = "osm";
pub const OSM_EXTENSION: &str = "osm";

/// Set of element names selected for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter(BTreeSet<String>);

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        if tags.is_empty() {
            return Err(SampleError::Validation(
                "at least one tag must be requested".to_string(),
            ));
        }
        Ok(TagFilter(tags))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Matches a raw element name as read off the event stream.
    pub fn matches(&self, name: &[u8]) -> bool {
        std::str::from_utf8(name).map_or(false, |name| self.0.contains(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A matched element, kept as the exact bytes it had in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    xml: Vec<u8>,
}

impl Element {
    pub(crate) fn new(name: String, xml: Vec<u8>) -> Self {
        Element { name, xml }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.xml
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.xml
    }
}

/// Distinct element names seen in a document, with occurrence counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagVocabulary(BTreeMap<String, usize>);

impl TagVocabulary {
    pub(crate) fn record(&mut self, name: &[u8]) {
        *self
            .0
            .entry(String::from_utf8_lossy(name).into_owned())
            .or_insert(0) += 1;
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains_key(tag)
    }

    pub fn count(&self, tag: &str) -> usize {
        self.0.get(tag).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(tag, count)| (tag.as_str(), *count))
    }

    /// Fails when any requested tag never occurs in the document.
    pub fn check(&self, filter: &TagFilter) -> Result<()> {
        let missing: Vec<String> = filter
            .iter()
            .filter(|tag| !self.contains(tag))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SampleError::MissingTags { missing })
        }
    }
}
