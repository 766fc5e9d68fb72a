//! Filesystem and in-memory collaborator implementations.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use super::{ArtifactStore, ImageSource, JobStatus, RecordStore, RecordUpdate};
use crate::error::{AnalysisError, AnalysisResult};

/// Reads images from files under a root directory. Locators are relative
/// paths and may not escape the root.
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, locator: &str) -> AnalysisResult<PathBuf> {
        let rel = Path::new(locator);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if locator.is_empty() || escapes {
            return Err(AnalysisError::Fetch {
                locator: locator.to_string(),
                reason: "locator must be a relative path inside the image root".into(),
            });
        }
        Ok(self.root.join(rel))
    }
}

impl ImageSource for FsImageSource {
    fn fetch(&self, locator: &str) -> AnalysisResult<Vec<u8>> {
        let path = self.resolve(locator)?;
        std::fs::read(&path).map_err(|err| AnalysisError::Fetch {
            locator: locator.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Writes `<tag>.png` into a directory and hands out `file://` locators.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn store(&self, tag: &str, png: &[u8]) -> AnalysisResult<String> {
        let fail = |reason: String| AnalysisError::Store {
            tag: tag.to_string(),
            reason,
        };
        if !is_plain_name(tag) {
            return Err(fail("tag must be a plain file name".into()));
        }
        std::fs::create_dir_all(&self.dir).map_err(|err| fail(err.to_string()))?;
        let path = self.dir.join(format!("{tag}.png"));
        std::fs::write(&path, png).map_err(|err| fail(err.to_string()))?;
        let abs = std::fs::canonicalize(&path).unwrap_or(path);
        tracing::trace!(tag, path = %abs.display(), "artifact stored");
        Ok(format!("file://{}", abs.display()))
    }
}

/// One pretty-printed JSON document per record: `<dir>/<record_id>.json`.
///
/// Updates are serialized so concurrent workers never interleave a
/// read-merge-write on the same document.
#[derive(Debug)]
pub struct JsonRecordStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, record_id: &str) -> PathBuf {
        self.dir.join(format!("{record_id}.json"))
    }

    /// Current document for `record_id`, if one was written.
    pub fn load(&self, record_id: &str) -> AnalysisResult<Option<Value>> {
        let path = self.path_for(record_id);
        if !path.exists() {
            return Ok(None);
        }
        let persist_err = |reason: String| AnalysisError::Persist {
            record_id: record_id.to_string(),
            reason,
        };
        let data = std::fs::read_to_string(&path).map_err(|err| persist_err(err.to_string()))?;
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|err| persist_err(err.to_string()))
    }
}

impl RecordStore for JsonRecordStore {
    fn update(&self, record_id: &str, update: &RecordUpdate) -> AnalysisResult<()> {
        let persist_err = |reason: String| AnalysisError::Persist {
            record_id: record_id.to_string(),
            reason,
        };
        if !is_plain_name(record_id) {
            return Err(persist_err("record id must be a plain file name".into()));
        }
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut doc = match self.load(record_id)? {
            Some(Value::Object(map)) => map,
            Some(_) => return Err(persist_err("existing record is not a JSON object".into())),
            None => Map::new(),
        };
        doc.insert("id".into(), Value::String(record_id.to_string()));
        merge_update(record_id, &mut doc, update)?;

        std::fs::create_dir_all(&self.dir).map_err(|err| persist_err(err.to_string()))?;
        let json = serde_json::to_string_pretty(&doc).map_err(|err| persist_err(err.to_string()))?;
        std::fs::write(self.path_for(record_id), json).map_err(|err| persist_err(err.to_string()))?;
        tracing::trace!(record_id, status = ?update.status, "record updated");
        Ok(())
    }
}

/// In-process record store keeping every status transition.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    inner: Mutex<MemoryRecords>,
}

#[derive(Debug, Default)]
struct MemoryRecords {
    docs: BTreeMap<String, Map<String, Value>>,
    history: BTreeMap<String, Vec<JobStatus>>,
}

impl MemoryRecordStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryRecords> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Merged document for `record_id`.
    pub fn get(&self, record_id: &str) -> Option<Value> {
        self.lock().docs.get(record_id).cloned().map(Value::Object)
    }

    /// Every status written for `record_id`, oldest first.
    pub fn statuses(&self, record_id: &str) -> Vec<JobStatus> {
        self.lock().history.get(record_id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn update(&self, record_id: &str, update: &RecordUpdate) -> AnalysisResult<()> {
        let mut guard = self.lock();
        let records = &mut *guard;
        let doc = records.docs.entry(record_id.to_string()).or_default();
        merge_update(record_id, doc, update)?;
        records
            .history
            .entry(record_id.to_string())
            .or_default()
            .push(update.status);
        Ok(())
    }
}

/// Overwrite `doc` with the fields present in `update`. A failed update also
/// clears any earlier success fields so a record never mixes both.
fn merge_update(
    record_id: &str,
    doc: &mut Map<String, Value>,
    update: &RecordUpdate,
) -> AnalysisResult<()> {
    let fields = match serde_json::to_value(update) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) | Err(_) => {
            return Err(AnalysisError::Persist {
                record_id: record_id.to_string(),
                reason: "record update did not serialize to an object".into(),
            })
        }
    };
    if update.status == JobStatus::Failed {
        doc.remove("risk_narrative");
        doc.remove("annotated_image_url");
    } else {
        doc.remove("error_kind");
    }
    doc.extend(fields);
    Ok(())
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
}
