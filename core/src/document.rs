use crate::error::LoadError;
use crate::index::DocId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A record as it appears in the input file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub teaser: Option<String>,
}

impl RawPost {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn has_text(&self) -> bool {
        let non_blank = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        let any_entry = |v: &Option<Vec<String>>| v.iter().flatten().any(|e| !e.trim().is_empty());
        non_blank(&self.title) || non_blank(&self.excerpt) || any_entry(&self.categories) || any_entry(&self.tags)
    }

    /// Convert into a [`Document`]. Callers validate with [`RawPost::url`] and
    /// [`RawPost::has_text`] first.
    pub(crate) fn into_document(self, id: DocId) -> Document {
        let url = self.url().unwrap_or_default().to_string();
        Document {
            id,
            title: self.title.unwrap_or_default(),
            excerpt: self.excerpt.unwrap_or_default(),
            categories: dedup_labels(self.categories.unwrap_or_default()),
            tags: dedup_labels(self.tags.unwrap_or_default()),
            url,
            teaser: self.teaser.filter(|t| !t.trim().is_empty()),
        }
    }
}

/// Labels are sets: blanks dropped, first occurrence kept.
fn dedup_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim().to_string();
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

/// A validated post. `id` is its position among accepted records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub excerpt: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub url: String,
    pub teaser: Option<String>,
}

pub fn parse_posts_json(src: &str) -> Result<Vec<RawPost>, serde_json::Error> {
    let json: serde_json::Value = serde_json::from_str(src)?;
    match json {
        serde_json::Value::Array(arr) => arr.into_iter().map(serde_json::from_value).collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// Extract the array literal from a `var store = [...]` script.
pub fn store_array(src: &str) -> Option<&str> {
    let start = src.find('[')?;
    let end = src.rfind(']')?;
    (end > start).then(|| &src[start..=end])
}

/// Read records from a single `.json`, `.jsonl` or `.js` store file.
pub fn load_posts(path: &Path) -> Result<Vec<RawPost>, LoadError> {
    let io_err = |source| LoadError::Io { path: path.to_path_buf(), source };
    let json_err = |source| LoadError::Json { path: path.to_path_buf(), source };

    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
    match ext {
        "json" => {
            let text = fs::read_to_string(path).map_err(io_err)?;
            parse_posts_json(&text).map_err(json_err)
        }
        "jsonl" => {
            let text = fs::read_to_string(path).map_err(io_err)?;
            text.lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::from_str(line).map_err(json_err))
                .collect()
        }
        "js" => {
            let text = fs::read_to_string(path).map_err(io_err)?;
            let array = store_array(&text).ok_or_else(|| LoadError::MissingStoreArray(path.to_path_buf()))?;
            parse_posts_json(array).map_err(json_err)
        }
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn is_record_file(p: &Path) -> bool {
    matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl" | "js"))
}

/// Read records from a file, or from every record file under a directory in
/// sorted path order.
pub fn load_posts_from_path(path: &Path) -> Result<Vec<RawPost>, LoadError> {
    if !path.is_dir() {
        return load_posts(path);
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_record_file(p))
        .collect();
    files.sort();

    let mut posts = Vec::new();
    for file in files {
        let batch = load_posts(&file)?;
        tracing::debug!(file = %file.display(), records = batch.len(), "loaded records");
        posts.extend(batch);
    }
    Ok(posts)
}
