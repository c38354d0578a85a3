//! Forward-only, memory-bounded access to the elements of an OSM XML extract.
//!
//! The reader never builds a tree. Bytes of the top-level child of `<osm>`
//! that is currently open are kept in a capture buffer so a matching element
//! can be handed out verbatim; the buffer is cleared as soon as that child
//! closes, so memory follows the largest single element rather than the
//! document.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{debug, info, trace};
use quick_xml::{events::Event, Reader, Writer};

use crate::{
    error::{Result, SampleError},
    utils::resolve_source,
    Element, TagFilter, TagVocabulary, ROOT_TAG,
};

pub struct OsmReader {
    path: PathBuf,
    cursor: Cursor,
}

impl OsmReader {
    /// Opens `source` under `resource_dir` and validates its root element.
    pub fn open(resource_dir: impl AsRef<Path>, source: impl AsRef<Path>) -> Result<Self> {
        let path = resolve_source(resource_dir.as_ref(), source)?;
        let cursor = Cursor::open(&path)?;
        debug!("opened {} with root <{}>", path.display(), cursor.root);
        Ok(OsmReader { path, cursor })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root tag exactly as spelled in the source.
    pub fn root_tag(&self) -> &str {
        &self.cursor.root
    }

    /// Lazily yields every element whose name is in `tags`, in the order the
    /// elements close. The sequence is consumed once; call [`rewind`] to read
    /// the document again.
    ///
    /// [`rewind`]: OsmReader::rewind
    pub fn elements<'a>(&'a mut self, tags: &'a TagFilter) -> Elements<'a> {
        Elements {
            cursor: &mut self.cursor,
            tags,
        }
    }

    /// Reopens the source from the first byte.
    pub fn rewind(&mut self) -> Result<()> {
        self.cursor = Cursor::open(&self.path)?;
        trace!("rewound {}", self.path.display());
        Ok(())
    }

    /// Reads the whole document and collects every element name it uses.
    ///
    /// The cursor is rewound afterwards.
    pub fn discover_tags(&mut self) -> Result<TagVocabulary> {
        if self.cursor.started {
            self.rewind()?;
        }
        info!(
            "collecting tag vocabulary of {}, this reads the whole file",
            self.path.display()
        );
        let start = Instant::now();

        let mut vocabulary = TagVocabulary::default();
        vocabulary.record(self.cursor.root.as_bytes());
        let cursor = &mut self.cursor;
        loop {
            cursor.buf.clear();
            match cursor.reader.read_event_into(&mut cursor.buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => vocabulary.record(e.name().as_ref()),
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(SampleError::xml(cursor.reader.buffer_position(), err)),
            }
        }

        info!("tag vocabulary collected in {:?}", start.elapsed());
        self.rewind()?;
        Ok(vocabulary)
    }
}

/// Iterator returned by [`OsmReader::elements`].
///
/// Stops for good after the first error.
pub struct Elements<'a> {
    cursor: &'a mut Cursor,
    tags: &'a TagFilter,
}

impl Iterator for Elements<'_> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.next_element(self.tags) {
            Ok(element) => element.map(Ok),
            Err(err) => {
                self.cursor.finished = true;
                Some(Err(err))
            }
        }
    }
}

struct OpenElement {
    start: usize,
    name: Option<String>,
}

struct Cursor {
    reader: Reader<BufReader<File>>,
    buf: Vec<u8>,
    capture: Writer<Vec<u8>>,
    open: Vec<OpenElement>,
    root: String,
    root_open: bool,
    started: bool,
    finished: bool,
}

impl Cursor {
    fn open(path: &Path) -> Result<Self> {
        let mut reader = Reader::from_reader(BufReader::new(File::open(path)?));
        reader
            .trim_text(false)
            .check_end_names(true)
            .expand_empty_elements(false);

        let mut buf = Vec::new();
        let (root, root_open) = read_root(&mut reader, &mut buf)?;
        Ok(Cursor {
            reader,
            buf,
            capture: Writer::new(Vec::new()),
            open: Vec::new(),
            root,
            root_open,
            started: false,
            finished: false,
        })
    }

    fn next_element(&mut self, tags: &TagFilter) -> Result<Option<Element>> {
        self.started = true;
        loop {
            if self.finished {
                return Ok(None);
            }
            self.buf.clear();
            let position = self.reader.buffer_position();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(err) => return Err(SampleError::xml(self.reader.buffer_position(), err)),
            };

            match event {
                Event::Start(e) => {
                    if !self.root_open {
                        return Err(SampleError::malformed(position, "element after the root"));
                    }
                    let start = self.capture.get_ref().len();
                    let name = tags
                        .matches(e.name().as_ref())
                        .then(|| String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    self.capture
                        .write_event(Event::Start(e))
                        .map_err(|err| SampleError::xml(position, err))?;
                    self.open.push(OpenElement { start, name });
                }
                Event::Empty(e) => {
                    if !self.root_open {
                        return Err(SampleError::malformed(position, "element after the root"));
                    }
                    let start = self.capture.get_ref().len();
                    let name = tags
                        .matches(e.name().as_ref())
                        .then(|| String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    self.capture
                        .write_event(Event::Empty(e))
                        .map_err(|err| SampleError::xml(position, err))?;
                    let element =
                        name.map(|name| Element::new(name, self.capture.get_ref()[start..].to_vec()));
                    if self.open.is_empty() {
                        self.capture.get_mut().clear();
                    }
                    if element.is_some() {
                        return Ok(element);
                    }
                }
                Event::End(e) => match self.open.pop() {
                    Some(open) => {
                        self.capture
                            .write_event(Event::End(e))
                            .map_err(|err| SampleError::xml(position, err))?;
                        let element = open.name.map(|name| {
                            Element::new(name, self.capture.get_ref()[open.start..].to_vec())
                        });
                        if self.open.is_empty() {
                            self.capture.get_mut().clear();
                        }
                        if element.is_some() {
                            return Ok(element);
                        }
                    }
                    None if self.root_open => self.root_open = false,
                    None => return Err(SampleError::malformed(position, "unexpected end tag")),
                },
                Event::Text(e) => {
                    if !self.open.is_empty() {
                        self.capture
                            .write_event(Event::Text(e))
                            .map_err(|err| SampleError::xml(position, err))?;
                    } else if !self.root_open && !e.iter().all(u8::is_ascii_whitespace) {
                        return Err(SampleError::malformed(position, "text after the root"));
                    }
                }
                Event::Eof => {
                    if self.root_open {
                        return Err(SampleError::malformed(
                            position,
                            format!("document ended before </{}>", self.root),
                        ));
                    }
                    self.finished = true;
                    return Ok(None);
                }
                Event::Decl(_) | Event::DocType(_) => {}
                other => {
                    if !self.open.is_empty() {
                        self.capture
                            .write_event(other)
                            .map_err(|err| SampleError::xml(position, err))?;
                    }
                }
            }
        }
    }
}

/// Skips the prolog and returns the root tag and whether it is still open.
fn read_root(reader: &mut Reader<BufReader<File>>, buf: &mut Vec<u8>) -> Result<(String, bool)> {
    loop {
        buf.clear();
        let position = reader.buffer_position();
        match reader.read_event_into(buf) {
            Ok(Event::Start(e)) => return check_root(e.name().as_ref()).map(|root| (root, true)),
            Ok(Event::Empty(e)) => return check_root(e.name().as_ref()).map(|root| (root, false)),
            Ok(Event::Text(e)) if e.iter().all(u8::is_ascii_whitespace) => {}
            Ok(Event::Text(_)) | Ok(Event::CData(_)) => {
                return Err(SampleError::malformed(position, "text before the root element"))
            }
            Ok(Event::End(_)) => {
                return Err(SampleError::malformed(position, "end tag before the root element"))
            }
            Ok(Event::Eof) => {
                return Err(SampleError::malformed(position, "document has no root element"))
            }
            Ok(_) => {}
            Err(err) => return Err(SampleError::xml(reader.buffer_position(), err)),
        }
    }
}

fn check_root(name: &[u8]) -> Result<String> {
    let root = String::from_utf8_lossy(name).into_owned();
    if root.eq_ignore_ascii_case(ROOT_TAG) {
        Ok(root)
    } else {
        Err(SampleError::RootTag {
            found: root,
            expected: ROOT_TAG,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::ErrorKind,
        fixtures::{self, NODES, WAYS},
    };

    fn open(content: &str) -> (tempfile::TempDir, Result<OsmReader>) {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write(dir.path(), "source.osm", content);
        let reader = OsmReader::open(dir.path(), "source.osm");
        (dir, reader)
    }

    fn names(reader: &mut OsmReader, tags: &[&str]) -> Vec<String> {
        let filter = TagFilter::new(tags.iter().copied()).unwrap();
        reader
            .elements(&filter)
            .map(|element| element.unwrap().name().to_string())
            .collect()
    }

    #[test_log::test]
    fn root_is_matched_without_case() {
        let (_dir, reader) = open("<?xml version=\"1.0\"?>\n<!-- extract -->\n<OSM></OSM>");
        assert_eq!(reader.unwrap().root_tag(), "OSM");
    }

    #[test_log::test]
    fn unexpected_root_is_a_format_error() {
        let (_dir, reader) = open("<gpx><trk/></gpx>");
        let err = reader.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(matches!(err, SampleError::RootTag { ref found, .. } if found == "gpx"));
    }

    #[test_log::test]
    fn empty_document_is_a_format_error() {
        let (_dir, reader) = open("");
        assert_eq!(reader.err().unwrap().kind(), ErrorKind::Format);
    }

    #[test_log::test]
    fn wrong_extension_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write(dir.path(), "source.xml", &fixtures::extract());
        let err = OsmReader::open(dir.path(), "source.xml").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test_log::test]
    fn elements_follow_document_order() {
        let (_dir, reader) = open(&fixtures::extract());
        let mut reader = reader.unwrap();

        let nodes: Vec<Element> = reader
            .elements(&TagFilter::new(["node"]).unwrap())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(nodes.len(), NODES);
        for (index, element) in nodes.iter().enumerate() {
            assert_eq!(element.as_bytes(), fixtures::node(index + 1).as_bytes());
        }
    }

    #[test_log::test]
    fn elements_are_copied_verbatim() {
        let source = "<osm>\n  <way id=\"7\">\n    <nd ref=\"1\"/>\n    <!-- keep -->\n    <tag k=\"name\" v=\"A &lt; B\"/>\n  </way>\n</osm>";
        let (_dir, reader) = open(source);
        let mut reader = reader.unwrap();
        let filter = TagFilter::new(["way"]).unwrap();
        let way = reader.elements(&filter).next().unwrap().unwrap();
        assert_eq!(
            std::str::from_utf8(way.as_bytes()).unwrap(),
            "<way id=\"7\">\n    <nd ref=\"1\"/>\n    <!-- keep -->\n    <tag k=\"name\" v=\"A &lt; B\"/>\n  </way>"
        );
    }

    #[test_log::test]
    fn nested_matches_close_before_their_parent() {
        let (_dir, reader) = open(&fixtures::extract());
        let mut reader = reader.unwrap();
        let found = names(&mut reader, &["node", "tag"]);
        assert_eq!(found.len(), NODES * 2 + WAYS);
        assert_eq!(&found[..4], ["tag", "node", "tag", "node"]);
    }

    #[test_log::test]
    fn capture_is_released_after_each_top_level_child() {
        let (_dir, reader) = open(&fixtures::extract());
        let mut reader = reader.unwrap();
        let filter = TagFilter::new(["way"]).unwrap();
        let mut elements = reader.elements(&filter);
        while let Some(element) = elements.next() {
            element.unwrap();
            assert!(elements.cursor.capture.get_ref().is_empty());
            assert!(elements.cursor.open.is_empty());
        }
    }

    #[test_log::test]
    fn mismatched_end_tag_aborts_the_stream() {
        let (_dir, reader) = open("<osm><node id=\"1\"/><way id=\"2\"></node></osm>");
        let mut reader = reader.unwrap();
        let filter = TagFilter::new(["node", "way"]).unwrap();
        let mut elements = reader.elements(&filter);
        assert!(elements.next().unwrap().is_ok());
        assert_eq!(elements.next().unwrap().unwrap_err().kind(), ErrorKind::Format);
        assert!(elements.next().is_none());
    }

    #[test_log::test]
    fn truncated_document_is_an_error() {
        let (_dir, reader) = open("<osm><node id=\"1\"/><node id=\"2\"/>");
        let mut reader = reader.unwrap();
        let filter = TagFilter::new(["node"]).unwrap();
        let results: Vec<Result<Element>> = reader.elements(&filter).collect();
        assert!(results.last().unwrap().is_err());
    }

    #[test_log::test]
    fn second_top_level_element_is_an_error() {
        let (_dir, reader) = open("<osm></osm><node id=\"1\"/>");
        let mut reader = reader.unwrap();
        let filter = TagFilter::new(["node"]).unwrap();
        let err = reader.elements(&filter).next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test_log::test]
    fn rewind_starts_a_fresh_pass() {
        let (_dir, reader) = open(&fixtures::extract());
        let mut reader = reader.unwrap();
        assert_eq!(names(&mut reader, &["way"]).len(), WAYS);
        assert!(names(&mut reader, &["way"]).is_empty());

        reader.rewind().unwrap();
        assert_eq!(names(&mut reader, &["way"]).len(), WAYS);
    }

    #[test_log::test]
    fn vocabulary_scan_leaves_cursor_at_the_start() {
        let (_dir, reader) = open(&fixtures::extract());
        let mut reader = reader.unwrap();
        let vocabulary = reader.discover_tags().unwrap();

        assert_eq!(vocabulary.count("osm"), 1);
        assert_eq!(vocabulary.count("node"), NODES);
        assert_eq!(vocabulary.count("way"), WAYS);
        assert_eq!(vocabulary.count("nd"), WAYS * 2);
        assert!(vocabulary.contains("bounds"));
        assert!(!vocabulary.contains("relation"));

        assert_eq!(names(&mut reader, &["node"]).len(), NODES);
    }
}
