use crate::utils::{Result, VsdxTranslatorError};
use std::collections::HashMap;
use std::io::{Read, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// One zip entry of an OPC package, held fully in memory.
#[derive(Debug, Clone)]
pub struct PackagePart {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: Option<DateTime>,
    pub is_dir: bool,
}

/// Unpacked size allowed for a whole package unless the caller sets one.
pub const DEFAULT_UNPACKED_LIMIT: u64 = 1024 * 1024 * 1024;

/// The zip container of a `.vsdx` file, entries kept in archive order.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<PackagePart>,
}

impl Package {
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::read_limited(reader, DEFAULT_UNPACKED_LIMIT)
    }

    /// Reads every entry, failing once the entries together unpack to more
    /// than `limit` bytes. Sizes declared in the zip headers are not trusted.
    pub fn read_limited<R: Read + Seek>(reader: R, limit: u64) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = Vec::new();
        let mut remaining = limit;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::new();
            let read = file
                .by_ref()
                .take(remaining.saturating_add(1))
                .read_to_end(&mut data)? as u64;
            if read > remaining {
                return Err(VsdxTranslatorError::InvalidDiagram(format!(
                    "package unpacks to more than {} bytes",
                    limit
                )));
            }
            remaining -= read;

            parts.push(PackagePart {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self { parts })
    }

    /// Part lookup; OPC part names compare case-insensitively.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let name = name.trim_start_matches('/');
        self.parts
            .iter()
            .find(|p| !p.is_dir && p.name.eq_ignore_ascii_case(name))
            .map(|p| p.data.as_slice())
    }

    pub fn parts(&self) -> &[PackagePart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Writes every entry back in its original order with its original
    /// modification time. Entries named in `replacements` get the
    /// replacement bytes instead of their own.
    pub fn write<W: Write + Seek>(
        &self,
        writer: W,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> Result<()> {
        let mut zip = ZipWriter::new(writer);

        for part in &self.parts {
            let method = match part.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = SimpleFileOptions::default().compression_method(method);
            if let Some(time) = part.last_modified {
                options = options.last_modified_time(time);
            }

            if part.is_dir {
                zip.add_directory(part.name.clone(), options)?;
                continue;
            }

            zip.start_file(part.name.clone(), options)?;
            let data = replacements
                .get(&part.name)
                .map(Vec::as_slice)
                .unwrap_or(part.data.as_slice());
            zip.write_all(data)?;
        }

        zip.finish()?;
        Ok(())
    }
}
