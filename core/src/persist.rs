use crate::{Result, DOCUMENTS_FIELD};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// On-disk layout of a stored index directory.
///
/// Every field index lives in `<root>/<field>_index.json`, for both store and load.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn field_index(&self, field: &str) -> PathBuf { self.root.join(format!("{field}_index.json")) }
    pub fn metadata(&self) -> PathBuf { self.root.join(format!("{DOCUMENTS_FIELD}_metadata_index.json")) }
    pub fn texts_dir(&self) -> PathBuf { self.root.join("texts") }
    /// Raw text of one field of a document, kept next to the index for snippet extraction.
    pub fn text(&self, field: &str, doc_id: &str) -> PathBuf {
        self.texts_dir().join(file_stem(field)).join(format!("{}.txt", file_stem(doc_id)))
    }
}

/// Injective file name for an arbitrary id: ASCII letters, digits and `-` pass through,
/// every other byte (including `_`) becomes `_XX`.
fn file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{b:02X}"));
        }
    }
    out
}

pub fn save_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    if pretty {
        serde_json::to_writer_pretty(&mut w, value)?;
    } else {
        serde_json::to_writer(&mut w, value)?;
    }
    w.flush()?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path)?;
    let value = serde_json::from_reader(BufReader::new(f))?;
    Ok(value)
}

/// Like [`load_json`], but a missing file is `Ok(None)`.
pub fn load_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    load_json(path).map(Some)
}

pub fn save_text(paths: &IndexPaths, field: &str, doc_id: &str, text: &str) -> Result<()> {
    let path = paths.text(field, doc_id);
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}

pub fn load_text(paths: &IndexPaths, field: &str, doc_id: &str) -> Option<String> {
    std::fs::read_to_string(paths.text(field, doc_id)).ok()
}
