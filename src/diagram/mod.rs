//! Reading and rewriting Visio `.vsdx` packages.
//!
//! A `.vsdx` file is an OPC zip. The page list lives in `pages.xml`, each
//! page's shapes in its own page part. Only page parts are ever rewritten;
//! every other entry keeps its data byte for byte, along with its name,
//! order, compression method and modification time.

pub mod package;
pub mod page;
pub mod rels;

#[cfg(test)]
pub(crate) mod fixtures;

pub use package::{Package, PackagePart, DEFAULT_UNPACKED_LIMIT};
pub use page::{Page, Shape};

use crate::utils::{Result, VsdxTranslatorError};
use rels::{parse_relationships, rels_part_for, resolve_target};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use xml::reader::{EventReader, XmlEvent};

const DEFAULT_DOCUMENT_PART: &str = "visio/document.xml";
const DEFAULT_PAGES_PART: &str = "visio/pages/pages.xml";

/// Stable handle to one shape of an open document. Text mutations never
/// invalidate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeRef {
    pub page: usize,
    pub shape: usize,
}

#[derive(Debug, Clone)]
pub struct VisioDocument {
    package: Package,
    pages: Vec<Page>,
}

impl VisioDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_limited(path, DEFAULT_UNPACKED_LIMIT)
    }

    /// Opens a diagram whose parts together may unpack to at most `limit`
    /// bytes.
    pub fn open_limited(path: impl AsRef<Path>, limit: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let document = Self::read_limited(BufReader::new(file), limit)?;
        tracing::debug!(
            path = %path.display(),
            pages = document.page_count(),
            shapes = document.shape_count(),
            "Opened diagram"
        );
        Ok(document)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read(Cursor::new(bytes))
    }

    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::read_limited(reader, DEFAULT_UNPACKED_LIMIT)
    }

    pub fn read_limited<R: Read + Seek>(reader: R, limit: u64) -> Result<Self> {
        let package = Package::read_limited(reader, limit)?;

        let mut pages = Vec::new();
        for (index, (name, part_name)) in locate_pages(&package)?.into_iter().enumerate() {
            let xml = package.part(&part_name).ok_or_else(|| {
                VsdxTranslatorError::InvalidDiagram(format!("missing page part {}", part_name))
            })?;
            pages.push(Page::parse(index, name, part_name, xml)?);
        }

        Ok(Self { package, pages })
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn shape_count(&self) -> usize {
        self.pages.iter().map(Page::shape_count).sum()
    }

    /// Every shape, pages in document order and shapes in page order.
    pub fn shape_refs(&self) -> impl Iterator<Item = ShapeRef> + '_ {
        self.pages.iter().enumerate().flat_map(|(page, p)| {
            (0..p.shape_count()).map(move |shape| ShapeRef { page, shape })
        })
    }

    pub fn shape_text(&self, shape: ShapeRef) -> Option<String> {
        self.pages.get(shape.page)?.shape_text(shape.shape)
    }

    pub fn set_shape_text(&mut self, shape: ShapeRef, text: &str) -> Result<()> {
        self.pages
            .get_mut(shape.page)
            .ok_or(VsdxTranslatorError::ShapeNotFound {
                page: shape.page,
                shape: shape.shape,
            })?
            .set_shape_text(shape.shape, text)
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut replacements = HashMap::new();
        for page in self.pages.iter().filter(|p| p.is_dirty()) {
            let entry = self
                .package
                .parts()
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(page.part_name()))
                .map(|p| p.name.clone())
                .unwrap_or_else(|| page.part_name().to_string());
            replacements.insert(entry, page.to_xml()?);
        }
        self.package.write(writer, &replacements)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.write_to(&mut out)?;
        Ok(out.into_inner())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        self.write_to(&mut file)?;
        file.flush()?;
        Ok(())
    }
}

/// Resolves `(page name, page part)` pairs in `pages.xml` order.
fn locate_pages(package: &Package) -> Result<Vec<(String, String)>> {
    let root_rels = match package.part("_rels/.rels") {
        Some(xml) => parse_relationships(xml)?,
        None => Vec::new(),
    };
    let document_part = root_rels
        .iter()
        .find(|r| r.is_type("document"))
        .map(|r| resolve_target("", &r.target))
        .unwrap_or_else(|| DEFAULT_DOCUMENT_PART.to_string());

    let document_rels = match package.part(&rels_part_for(&document_part)) {
        Some(xml) => parse_relationships(xml)?,
        None => Vec::new(),
    };
    let pages_part = document_rels
        .iter()
        .find(|r| r.is_type("pages"))
        .map(|r| resolve_target(&document_part, &r.target))
        .unwrap_or_else(|| DEFAULT_PAGES_PART.to_string());

    let pages_xml = package.part(&pages_part).ok_or_else(|| {
        VsdxTranslatorError::InvalidDiagram(format!("missing pages part {}", pages_part))
    })?;
    let page_rels = package
        .part(&rels_part_for(&pages_part))
        .map(parse_relationships)
        .transpose()?
        .unwrap_or_default();

    parse_page_index(pages_xml)?
        .into_iter()
        .map(|(name, rel_id)| {
            let rel = page_rels.iter().find(|r| r.id == rel_id).ok_or_else(|| {
                VsdxTranslatorError::InvalidDiagram(format!(
                    "page '{}' references unknown relationship {}",
                    name, rel_id
                ))
            })?;
            Ok((name, resolve_target(&pages_part, &rel.target)))
        })
        .collect()
}

/// Reads `<Page Name=..><Rel r:id=../></Page>` entries from `pages.xml`.
fn parse_page_index(xml: &[u8]) -> Result<Vec<(String, String)>> {
    let mut entries = Vec::new();
    let mut current_name: Option<String> = None;

    for event in EventReader::new(xml) {
        match event? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => match name.local_name.as_str() {
                "Page" => {
                    let attr = |key: &str| {
                        attributes
                            .iter()
                            .find(|a| a.name.local_name == key && a.name.prefix.is_none())
                            .map(|a| a.value.clone())
                    };
                    current_name = Some(
                        attr("Name")
                            .or_else(|| attr("NameU"))
                            .unwrap_or_else(|| format!("Page-{}", entries.len() + 1)),
                    );
                }
                "Rel" => {
                    if let Some(page_name) = current_name.take() {
                        let rel_id = attributes
                            .iter()
                            .find(|a| a.name.local_name == "id")
                            .map(|a| a.value.clone())
                            .ok_or_else(|| {
                                VsdxTranslatorError::InvalidDiagram(format!(
                                    "page '{}' has no relationship id",
                                    page_name
                                ))
                            })?;
                        entries.push((page_name, rel_id));
                    }
                }
                _ => {}
            },
            XmlEvent::EndElement { name } if name.local_name == "Page" => {
                if let Some(page_name) = current_name.take() {
                    return Err(VsdxTranslatorError::InvalidDiagram(format!(
                        "page '{}' has no Rel element",
                        page_name
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(entries)
}
