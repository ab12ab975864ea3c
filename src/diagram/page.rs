use crate::utils::{Result, VsdxTranslatorError};
use xml::attribute::OwnedAttribute;
use xml::reader::{ParserConfig, XmlEvent};
use xml::writer::EmitterConfig;

/// A run of page XML events. `TextBody` runs hold exactly the content of one
/// shape's `<Text>` element, so rewriting a shape never shifts another.
#[derive(Debug, Clone)]
enum Segment {
    Markup(Vec<XmlEvent>),
    TextBody(Vec<XmlEvent>),
}

impl Segment {
    fn events(&self) -> &[XmlEvent] {
        match self {
            Segment::Markup(events) | Segment::TextBody(events) => events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    id: Option<String>,
    name: Option<String>,
    depth: usize,
    text_segment: Option<usize>,
}

impl Shape {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 0 for top-level shapes, 1 for members of a group, and so on.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    index: usize,
    name: String,
    part_name: String,
    segments: Vec<Segment>,
    shapes: Vec<Shape>,
    dirty: bool,
}

impl Page {
    /// Parses one page part. `index` is the page's position in the document
    /// and only shows up in error values.
    pub fn parse(
        index: usize,
        name: impl Into<String>,
        part_name: impl Into<String>,
        xml: &[u8],
    ) -> Result<Self> {
        let reader = ParserConfig::new()
            .trim_whitespace(false)
            .whitespace_to_characters(true)
            .cdata_to_characters(false)
            .ignore_comments(false)
            .coalesce_characters(true)
            .create_reader(xml);

        let mut segments = Vec::new();
        let mut current: Vec<XmlEvent> = Vec::new();
        let mut shapes: Vec<Shape> = Vec::new();
        let mut elements: Vec<String> = Vec::new();
        let mut open_shapes: Vec<usize> = Vec::new();
        // (owning shape, element depth of <Text>, body events)
        let mut text_body: Option<(usize, usize, Vec<XmlEvent>)> = None;

        for event in reader {
            let event = event?;
            if matches!(event, XmlEvent::EndDocument) {
                continue;
            }

            if let Some((shape, depth, body)) = text_body.as_mut() {
                let closes_text =
                    matches!(event, XmlEvent::EndElement { .. }) && elements.len() == *depth;
                if closes_text {
                    let shape = *shape;
                    let body = std::mem::take(body);
                    segments.push(Segment::Markup(std::mem::take(&mut current)));
                    segments.push(Segment::TextBody(body));
                    shapes[shape].text_segment = Some(segments.len() - 1);
                    text_body = None;
                    elements.pop();
                    current.push(event);
                } else {
                    match &event {
                        XmlEvent::StartElement { name, .. } => {
                            elements.push(name.local_name.clone())
                        }
                        XmlEvent::EndElement { .. } => {
                            elements.pop();
                        }
                        _ => {}
                    }
                    body.push(event);
                }
                continue;
            }

            let mut opens_text = None;
            match &event {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => {
                    let parent_is_shape = elements.last().map(String::as_str) == Some("Shape");
                    elements.push(name.local_name.clone());

                    if name.local_name == "Shape" {
                        shapes.push(Shape {
                            id: attribute(attributes, "ID"),
                            name: attribute(attributes, "NameU")
                                .or_else(|| attribute(attributes, "Name")),
                            depth: open_shapes.len(),
                            text_segment: None,
                        });
                        open_shapes.push(shapes.len() - 1);
                    } else if name.local_name == "Text" && parent_is_shape {
                        opens_text = open_shapes.last().copied();
                    }
                }
                XmlEvent::EndElement { name } => {
                    elements.pop();
                    if name.local_name == "Shape" {
                        open_shapes.pop();
                    }
                }
                _ => {}
            }

            current.push(event);
            if let Some(shape) = opens_text {
                text_body = Some((shape, elements.len(), Vec::new()));
            }
        }

        if text_body.is_some() {
            return Err(VsdxTranslatorError::InvalidDiagram(
                "unterminated Text element".to_string(),
            ));
        }
        segments.push(Segment::Markup(current));

        Ok(Self {
            index,
            name: name.into(),
            part_name: part_name.into(),
            segments,
            shapes,
            dirty: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Shapes in document preorder: a group comes before its members.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All character data inside the shape's `<Text>`, markup dropped.
    /// Shapes without a text element read as the empty string.
    pub fn shape_text(&self, index: usize) -> Option<String> {
        let shape = self.shapes.get(index)?;
        let Some(segment) = shape.text_segment else {
            return Some(String::new());
        };

        let mut text = String::new();
        for event in self.segments[segment].events() {
            if let Some(chunk) = character_data(event) {
                text.push_str(chunk);
            }
        }
        Some(text)
    }

    /// Replaces the shape's character data with `value`, placed where the
    /// first run of character data was. Formatting markers (`cp`, `pp`,
    /// `tp`, `fld`) stay where they are.
    pub fn set_shape_text(&mut self, index: usize, value: &str) -> Result<()> {
        let page = self.index;
        let shape = self
            .shapes
            .get(index)
            .ok_or(VsdxTranslatorError::ShapeNotFound { page, shape: index })?;
        let segment = shape
            .text_segment
            .ok_or(VsdxTranslatorError::NoTextElement { page, shape: index })?;

        let Segment::TextBody(body) = &mut self.segments[segment] else {
            return Err(VsdxTranslatorError::InvalidDiagram(
                "text slot points at markup".to_string(),
            ));
        };

        let insert_at = match body.iter().position(|e| character_data(e).is_some()) {
            Some(first) => body[..first]
                .iter()
                .filter(|e| character_data(e).is_none())
                .count(),
            None => body.len(),
        };
        body.retain(|e| character_data(e).is_none());
        if !value.is_empty() {
            body.insert(insert_at, XmlEvent::Characters(value.to_string()));
        }

        self.dirty = true;
        Ok(())
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut writer = EmitterConfig::new()
                .perform_indent(false)
                .write_document_declaration(true)
                .create_writer(&mut out);

            for segment in &self.segments {
                for event in segment.events() {
                    if let Some(event) = event.as_writer_event() {
                        writer.write(event)?;
                    }
                }
            }
        }
        Ok(out)
    }
}

fn character_data(event: &XmlEvent) -> Option<&str> {
    match event {
        XmlEvent::Characters(s) | XmlEvent::Whitespace(s) | XmlEvent::CData(s) => Some(s),
        _ => None,
    }
}

fn attribute(attributes: &[OwnedAttribute], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|a| a.name.local_name == key && a.name.prefix.is_none())
        .map(|a| a.value.clone())
}
