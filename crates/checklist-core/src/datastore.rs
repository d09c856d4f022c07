use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::store::{CollectionRef, RecordStore};
use crate::task::{Task, TaskId, TaskPatch};

/// File-backed record store: one `<collection>.data` file per collection,
/// one JSON task per line, rewritten atomically on every write.
#[derive(Debug)]
pub struct JsonlStore {
    pub data_dir: PathBuf,
}

impl JsonlStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened datastore");
        Ok(Self { data_dir })
    }

    pub fn collection_path(&self, collection: &CollectionRef) -> PathBuf {
        self.data_dir.join(format!("{}.data", collection.name()))
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self, collection: &CollectionRef) -> Result<Vec<Task>, PersistenceError> {
        let path = self.collection_path(collection);
        if !path.exists() {
            debug!(file = %path.display(), "collection file missing; treating as empty");
            return Ok(vec![]);
        }
        load_jsonl(&path)
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save(&self, collection: &CollectionRef, tasks: &[Task]) -> Result<(), PersistenceError> {
        save_jsonl_atomic(&self.collection_path(collection), tasks)
    }

    /// Drops completed tasks from the collection file.
    #[tracing::instrument(skip(self))]
    pub fn purge_completed(&self, collection: &CollectionRef) -> Result<usize, PersistenceError> {
        let tasks = self.load(collection)?;
        let before_count = tasks.len();
        let kept: Vec<Task> = tasks.into_iter().filter(|task| !task.completed).collect();
        let removed = before_count - kept.len();
        info!(before = before_count, after = kept.len(), "purged completed tasks");
        self.save(collection, &kept)?;
        Ok(removed)
    }
}

impl RecordStore for JsonlStore {
    fn create_record(
        &mut self,
        collection: &CollectionRef,
        record: &Task,
    ) -> Result<(), PersistenceError> {
        let mut tasks = self.load(collection)?;
        if tasks.iter().any(|t| t.id == record.id) {
            return Err(PersistenceError::DuplicateId(record.id.clone()));
        }
        tasks.push(record.clone());
        self.save(collection, &tasks)
    }

    fn change_record(
        &mut self,
        collection: &CollectionRef,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<(), PersistenceError> {
        let mut tasks = self.load(collection)?;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        task.apply(patch);
        self.save(collection, &tasks)
    }

    fn delete_record(
        &mut self,
        collection: &CollectionRef,
        id: &TaskId,
    ) -> Result<(), PersistenceError> {
        let mut tasks = self.load(collection)?;
        let idx = tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        tasks.remove(idx);
        self.save(collection, &tasks)
    }

    fn snapshot(&self, collection: &CollectionRef) -> Result<Vec<Task>, PersistenceError> {
        self.load(collection)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> Result<Vec<Task>, PersistenceError> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed).map_err(|err| {
            PersistenceError::Unavailable(format!(
                "failed parsing {} line {}: {err}",
                path.display(),
                idx + 1
            ))
        })?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> Result<(), PersistenceError> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path).map_err(|err| {
        PersistenceError::Unavailable(format!("failed to persist {}: {}", path.display(), err))
    })?;

    Ok(())
}
