use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{
    error::{Result, SampleError},
    OSM_EXTENSION,
};

pub fn has_osm_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(OSM_EXTENSION))
}

pub fn ensure_osm_extension(path: &Path) -> Result<()> {
    if has_osm_extension(path) {
        Ok(())
    } else {
        Err(SampleError::Extension {
            path: path.to_path_buf(),
            expected: OSM_EXTENSION,
        })
    }
}

/// Resolves `source` against the resource directory and checks it is a file.
pub fn resolve_source(resource_dir: &Path, source: impl AsRef<Path>) -> Result<PathBuf> {
    let source = source.as_ref();
    ensure_osm_extension(source)?;
    let path = resource_dir.join(source);
    if !path.is_file() {
        return Err(SampleError::Path {
            path,
            reason: "source file does not exist",
        });
    }
    Ok(path)
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(SampleError::Path {
            path: path.to_path_buf(),
            reason: "output directory does not exist",
        })
    }
}

/// Sibling path the exporter writes to before the final rename.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn extension_check_ignores_case() {
        assert!(has_osm_extension(Path::new("gurugram.osm")));
        assert!(has_osm_extension(Path::new("extracts/Gurugram.OSM")));
        assert!(!has_osm_extension(Path::new("gurugram.osm.pbf")));
        assert!(!has_osm_extension(Path::new("osm")));
    }

    #[test]
    fn missing_source_is_a_path_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_source(dir.path(), "missing.osm").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);

        let err = resolve_source(dir.path(), "missing.xml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn partial_path_stays_next_to_destination() {
        assert_eq!(
            partial_path(Path::new("out/data10.osm")),
            PathBuf::from("out/data10.osm.partial")
        );
    }
}
