//! Minimal `.vsdx` packages for tests.

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const VISIO_NS: &str = "http://schemas.microsoft.com/office/visio/2012/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub fn shape(id: u32, text: &str) -> String {
    format!(
        r#"<Shape ID="{id}" NameU="Box.{id}" Type="Shape"><Cell N="PinX" V="{id}.5"/><Text><cp IX="0"/>{text}</Text></Shape>"#
    )
}

pub fn shape_without_text(id: u32) -> String {
    format!(r#"<Shape ID="{id}" NameU="Line.{id}" Type="Shape"><Cell N="LineWeight" V="0.01"/></Shape>"#)
}

pub fn group(id: u32, members: &str) -> String {
    format!(r#"<Shape ID="{id}" NameU="Group.{id}" Type="Group"><Shapes>{members}</Shapes></Shape>"#)
}

#[derive(Debug, Default)]
pub struct VsdxFixture {
    pages: Vec<(String, String)>,
    reverse_part_numbers: bool,
    without_pages_part: bool,
}

impl VsdxFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, name: &str, shapes_xml: &str) -> Self {
        self.pages.push((name.to_string(), shapes_xml.to_string()));
        self
    }

    /// Numbers page parts backwards so part names disagree with page order.
    pub fn reverse_part_numbers(mut self) -> Self {
        self.reverse_part_numbers = true;
        self
    }

    pub fn without_pages_part(mut self) -> Self {
        self.without_pages_part = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut put = |name: &str, body: String| {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        put(
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_string(),
        );
        put(
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.microsoft.com/visio/2010/relationships/document" Target="visio/document.xml"/></Relationships>"#.to_string(),
        );
        put(
            "visio/document.xml",
            format!(r#"<?xml version="1.0" encoding="utf-8"?><VisioDocument xmlns="{VISIO_NS}"/>"#),
        );
        put(
            "visio/_rels/document.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.microsoft.com/visio/2010/relationships/pages" Target="pages/pages.xml"/></Relationships>"#.to_string(),
        );

        let count = self.pages.len();
        let part_number = |i: usize| {
            if self.reverse_part_numbers {
                count - i
            } else {
                i + 1
            }
        };

        if !self.without_pages_part {
            let mut index = format!(r#"<?xml version="1.0" encoding="utf-8"?><Pages xmlns="{VISIO_NS}" xmlns:r="{REL_NS}">"#);
            let mut rels = String::from(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            );
            for (i, (name, _)) in self.pages.iter().enumerate() {
                index.push_str(&format!(
                    r#"<Page ID="{i}" NameU="{name}" Name="{name}"><PageSheet><Cell N="PageWidth" V="8.5"/></PageSheet><Rel r:id="rId{}"/></Page>"#,
                    i + 1
                ));
                rels.push_str(&format!(
                    r#"<Relationship Id="rId{}" Type="http://schemas.microsoft.com/visio/2010/relationships/page" Target="page{}.xml"/>"#,
                    i + 1,
                    part_number(i)
                ));
            }
            index.push_str("</Pages>");
            rels.push_str("</Relationships>");
            put("visio/pages/pages.xml", index);
            put("visio/pages/_rels/pages.xml.rels", rels);
        }

        for (i, (_, shapes)) in self.pages.iter().enumerate() {
            put(
                &format!("visio/pages/page{}.xml", part_number(i)),
                format!(
                    r#"<?xml version="1.0" encoding="utf-8"?><PageContents xmlns="{VISIO_NS}" xmlns:r="{REL_NS}" xml:space="preserve"><Shapes>{shapes}</Shapes><Connects/></PageContents>"#
                ),
            );
        }

        zip.finish().unwrap().into_inner()
    }
}
