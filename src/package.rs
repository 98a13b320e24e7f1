//! Package reader: the zip container of a DOCX file, exposed as named parts.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::{Error, Result};

pub(crate) const MAIN_DOCUMENT: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOC: u64 = 1 << 20;

/// One named entry of the container. Immutable once read.
#[derive(Clone, Debug)]
pub struct PackagePart {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PackagePart {
    /// Part content as UTF-8 text, without a byte-order mark.
    pub fn text(&self) -> Result<&str> {
        let bytes = self
            .bytes
            .strip_prefix(&[0xEF, 0xBB, 0xBF])
            .unwrap_or(&self.bytes);
        std::str::from_utf8(bytes)
            .map_err(|e| Error::CorruptArchive(format!("{} is not UTF-8: {e}", self.name)))
    }
}

#[derive(Clone, Debug)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Target resolved to a part name (no leading slash) unless `external`.
    pub target: String,
    pub external: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Relationships {
    by_id: HashMap<String, Relationship>,
}

impl Relationships {
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn first_of_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.by_id.values().find(|r| r.rel_type == rel_type)
    }
}

/// Opened DOCX container. All parts are read eagerly so later lookups never touch
/// the archive again.
#[derive(Debug)]
pub struct Package {
    parts: BTreeMap<String, PackagePart>,
}

impl Package {
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::CorruptArchive(format!("not a zip archive: {e}")))?;

        let mut parts = BTreeMap::new();
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| Error::CorruptArchive(format!("entry {i}: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().trim_start_matches('/').to_string();
            let mut data = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::CorruptArchive(format!("{name}: {e}")))?;
            parts.insert(name.clone(), PackagePart { name, bytes: data });
        }

        log::debug!("Opened package with {} parts", parts.len());
        Ok(Self { parts })
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{e}: {}", path.display())))
        })?;
        Self::open(&bytes)
    }

    /// Reads the file through tokio. Overlapping parses of the same source are not
    /// coordinated; callers serialize them.
    #[cfg(feature = "async")]
    pub async fn open_path_async(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{e}: {}", path.display())))
        })?;
        Self::open(&bytes)
    }

    pub fn part(&self, name: &str) -> Result<&PackagePart> {
        self.optional_part(name)
            .ok_or_else(|| Error::PartMissing(name.to_string()))
    }

    pub fn optional_part(&self, name: &str) -> Option<&PackagePart> {
        self.parts.get(name.trim_start_matches('/'))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Relationships owned by `part_name` (e.g. `word/document.xml` →
    /// `word/_rels/document.xml.rels`). Absent or unreadable tables are empty.
    pub fn relationships(&self, part_name: &str) -> Relationships {
        let Some(part) = self.optional_part(&rels_path_for(part_name)) else {
            return Relationships::default();
        };
        let Ok(text) = part.text() else {
            return Relationships::default();
        };
        parse_rels_xml(text, part_dir(part_name))
    }

    /// Name of the main document part, following the package-level relationship
    /// when present.
    pub fn main_document_name(&self) -> String {
        self.relationships("")
            .first_of_type(OFFICE_DOCUMENT_REL)
            .filter(|r| !r.external)
            .map(|r| r.target.clone())
            .unwrap_or_else(|| MAIN_DOCUMENT.to_string())
    }
}

fn rels_path_for(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None if part_name.is_empty() => "_rels/.rels".to_string(),
        None => format!("_rels/{part_name}.rels"),
    }
}

fn part_dir(part_name: &str) -> &str {
    part_name.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}

/// Resolve a relationship target relative to the directory of its source part.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn parse_rels_xml(xml_content: &str, base_dir: &str) -> Relationships {
    let mut rels = Relationships::default();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("Unparsable relationship table under {base_dir:?}");
        return rels;
    };
    for node in xml.root_element().children() {
        if node.tag_name().name() != "Relationship" {
            continue;
        }
        let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) else {
            continue;
        };
        let external = node.attribute("TargetMode") == Some("External");
        let target = if external {
            target.to_string()
        } else {
            resolve_target(base_dir, target)
        };
        rels.by_id.insert(
            id.to_string(),
            Relationship {
                id: id.to_string(),
                rel_type: node.attribute("Type").unwrap_or_default().to_string(),
                target,
                external,
            },
        );
    }
    rels
}
