use std::{fs, path::Path};

pub const NODES: usize = 10;
pub const WAYS: usize = 5;

pub fn node(id: usize) -> String {
    format!(
        r#"<node id="{id}" lat="28.4{id:03}" lon="77.0{id:03}"><tag k="amenity" v="cafe &amp; bar"/></node>"#
    )
}

pub fn way(id: usize) -> String {
    format!(r#"<way id="{id}"><nd ref="1"/><nd ref="2"/><tag k="highway" v="residential"/></way>"#)
}

/// Ten nodes followed by five ways under an `<osm>` root.
pub fn extract() -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<osm version=\"0.6\" generator=\"fixture\">\n",
    );
    xml.push_str("  <bounds minlat=\"28.4\" minlon=\"77.0\" maxlat=\"28.5\" maxlon=\"77.1\"/>\n");
    for id in 1..=NODES {
        xml.push_str("  ");
        xml.push_str(&node(id));
        xml.push('\n');
    }
    for id in 1..=WAYS {
        xml.push_str("  ");
        xml.push_str(&way(100 + id));
        xml.push('\n');
    }
    xml.push_str("</osm>\n");
    xml
}

pub fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}
