use crate::utils::Result;
use xml::reader::{EventReader, XmlEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

impl Relationship {
    /// Relationship types are URIs; Visio ones end in `/document`, `/pages`, `/page`.
    pub fn is_type(&self, suffix: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(suffix)
    }
}

pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut relationships = Vec::new();

    for event in EventReader::new(xml) {
        if let XmlEvent::StartElement {
            name, attributes, ..
        } = event?
        {
            if name.local_name != "Relationship" {
                continue;
            }
            let attr = |key: &str| {
                attributes
                    .iter()
                    .find(|a| a.name.local_name == key)
                    .map(|a| a.value.clone())
                    .unwrap_or_default()
            };
            if attr("TargetMode") == "External" {
                continue;
            }
            relationships.push(Relationship {
                id: attr("Id"),
                rel_type: attr("Type"),
                target: attr("Target"),
            });
        }
    }

    Ok(relationships)
}

/// `visio/pages/pages.xml` -> `visio/pages/_rels/pages.xml.rels`
pub fn rels_part_for(part: &str) -> String {
    let part = part.trim_start_matches('/');
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolves a relationship target against the part that owns the
/// relationship. An empty source means the package root.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let mut segments: Vec<&str> = if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute.split('/'));
    } else {
        source_part
            .trim_start_matches('/')
            .rsplit_once('/')
            .map(|(dir, _)| dir.split('/').collect())
            .unwrap_or_default()
    };
    segments.extend(target.split('/'));
    normalize(segments.into_iter())
}

fn normalize<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out.join("/")
}
