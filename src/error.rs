use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SampleError>;

/// Broad classification of a [`SampleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Path,
    Validation,
    Io,
}

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("{}: expected a .{expected} file", path.display())]
    Extension { path: PathBuf, expected: &'static str },

    #[error("root element is <{found}>, expected <{expected}>")]
    RootTag { found: String, expected: &'static str },

    #[error("malformed document at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    #[error("xml error at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("{}: {reason}", path.display())]
    Path { path: PathBuf, reason: &'static str },

    #[error("invalid export plan: {0}")]
    Validation(String),

    #[error("tags not present in source: {}", missing.join(", "))]
    MissingTags { missing: Vec<String> },

    #[error("could not read plan: {0}")]
    Plan(#[from] quick_xml::DeError),

    #[error(
        "export to {} failed after {} completed file(s): {source}",
        destination.display(),
        completed.len()
    )]
    Export {
        destination: PathBuf,
        completed: Vec<PathBuf>,
        #[source]
        source: Box<SampleError>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SampleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SampleError::Extension { .. }
            | SampleError::RootTag { .. }
            | SampleError::Malformed { .. }
            | SampleError::Xml { .. } => ErrorKind::Format,
            SampleError::Path { .. } => ErrorKind::Path,
            SampleError::Validation(_) | SampleError::MissingTags { .. } => ErrorKind::Validation,
            SampleError::Plan(_) => ErrorKind::Format,
            SampleError::Export { source, .. } => source.kind(),
            SampleError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        SampleError::Malformed {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn xml(position: usize, source: quick_xml::Error) -> Self {
        SampleError::Xml { position, source }
    }
}
