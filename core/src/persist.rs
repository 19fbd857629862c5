use crate::error::PersistError;
use crate::index::{SearchIndex, INDEX_VERSION};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub type Result<T> = std::result::Result<T, PersistError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn for_index(index: &SearchIndex) -> Self {
        Self {
            num_docs: index.num_docs() as u32,
            num_terms: index.num_terms() as u32,
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            version: index.version,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn export(&self) -> PathBuf { self.root.join("index.json") }
}

/// Encode an index. Equal indexes encode to equal bytes.
pub fn serialize(index: &SearchIndex) -> Result<Vec<u8>> {
    Ok(bincode::serialize(index)?)
}

/// Decode an index and check it before handing it out.
pub fn deserialize(bytes: &[u8]) -> Result<SearchIndex> {
    let index: SearchIndex = bincode::deserialize(bytes)?;
    if index.version != INDEX_VERSION {
        return Err(PersistError::VersionMismatch { found: index.version, expected: INDEX_VERSION });
    }
    index.validate().map_err(PersistError::Corrupt)?;
    Ok(index)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    Ok(())
}

fn discard(tmps: &[PathBuf]) {
    for tmp in tmps {
        let _ = fs::remove_file(tmp);
    }
}

/// Stage every file next to its target, then rename them into place in order.
/// Readers see either the old file or the new one, and a failure leaves no
/// temp files behind.
fn commit(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut staged: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        let tmp = tmp_path(path);
        if let Err(err) = write_synced(&tmp, bytes) {
            staged.push(tmp);
            discard(&staged);
            return Err(err);
        }
        staged.push(tmp);
    }
    for (i, (path, _)) in files.iter().enumerate() {
        if let Err(err) = fs::rename(&staged[i], path) {
            discard(&staged[i..]);
            return Err(err.into());
        }
    }
    Ok(())
}

/// Persist `index` and its `meta.json`. Both are fully written before either
/// is renamed, and `index.bin` is renamed first.
pub fn save_index(paths: &IndexPaths, index: &SearchIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let meta = MetaFile::for_index(index);
    commit(&[
        (paths.index(), serialize(index)?),
        (paths.meta(), serde_json::to_vec_pretty(&meta)?),
    ])?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "index saved");
    Ok(meta)
}

pub fn load_index(paths: &IndexPaths) -> Result<SearchIndex> {
    let mut f = File::open(paths.index())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    deserialize(&buf)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Load the index together with its metadata, failing when the two describe
/// different indexes.
pub fn load_with_meta(paths: &IndexPaths) -> Result<(SearchIndex, MetaFile)> {
    let index = load_index(paths)?;
    let meta = load_meta(paths)?;
    let found = (meta.num_docs as usize, meta.num_terms as usize, meta.version);
    let actual = (index.num_docs(), index.num_terms(), index.version());
    if found != actual {
        return Err(PersistError::Corrupt(format!(
            "meta.json describes {} documents and {} terms (version {}) but index.bin holds {} and {} (version {})",
            found.0, found.1, found.2, actual.0, actual.1, actual.2
        )));
    }
    Ok((index, meta))
}

/// JSON copy of the index for clients that cannot read bincode.
pub fn export_json(paths: &IndexPaths, index: &SearchIndex) -> Result<PathBuf> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_vec(index)?;
    let path = paths.export();
    commit(&[(path.clone(), json)])?;
    Ok(path)
}
