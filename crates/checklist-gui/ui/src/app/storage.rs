use checklist_core::{
  CollectionRef,
  Filter,
  PersistenceError,
  RecordStore,
  Task,
  TaskId,
  TaskPatch
};
use web_sys::Storage;

const TASKS_STORAGE_PREFIX: &str =
  "checklist.tasks.";
const FILTER_STORAGE_KEY: &str =
  "checklist.filter";

fn local_storage() -> Option<Storage> {
  web_sys::window().and_then(
    |window| {
      window
        .local_storage()
        .ok()
        .flatten()
    }
  )
}

pub fn load_filter() -> Filter {
  let stored = local_storage()
    .and_then(|storage| {
      storage
        .get_item(FILTER_STORAGE_KEY)
        .ok()
        .flatten()
    });

  match stored.as_deref() {
    | Some(raw) => {
      match raw.parse::<Filter>() {
        | Ok(filter) => filter,
        | Err(err) => {
          tracing::warn!(
            error = %err,
            "ignoring stored filter"
          );
          Filter::default()
        }
      }
    }
    | None => Filter::default()
  }
}

pub fn save_filter(filter: Filter) {
  if let Some(storage) =
    local_storage()
  {
    let _ = storage.set_item(
      FILTER_STORAGE_KEY,
      filter.as_key()
    );
  }
}

/// Browser backend: each collection is
/// one JSON array under
/// `checklist.tasks.<name>`.
#[derive(
  Debug, Clone, Copy, Default,
)]
pub struct LocalStorageStore;

impl LocalStorageStore {
  fn storage()
  -> Result<Storage, PersistenceError>
  {
    local_storage().ok_or_else(|| {
      PersistenceError::Unavailable(
        "localStorage is not \
         available"
          .to_string()
      )
    })
  }

  fn key(
    collection: &CollectionRef
  ) -> String {
    format!(
      "{TASKS_STORAGE_PREFIX}{}",
      collection.name()
    )
  }

  fn read(
    collection: &CollectionRef
  ) -> Result<Vec<Task>, PersistenceError>
  {
    let raw = Self::storage()?
      .get_item(&Self::key(collection))
      .map_err(|err| {
        PersistenceError::Unavailable(
          format!(
            "failed to read \
             {collection}: {err:?}"
          )
        )
      })?;

    match raw {
      | Some(raw) => {
        Ok(serde_json::from_str(&raw)?)
      }
      | None => Ok(Vec::new())
    }
  }

  fn write(
    collection: &CollectionRef,
    records: &[Task]
  ) -> Result<(), PersistenceError> {
    let raw =
      serde_json::to_string(records)?;
    Self::storage()?
      .set_item(
        &Self::key(collection),
        &raw
      )
      .map_err(|err| {
        PersistenceError::Unavailable(
          format!(
            "failed to write \
             {collection}: {err:?}"
          )
        )
      })?;

    tracing::debug!(
      collection = %collection,
      count = records.len(),
      "saved collection"
    );
    Ok(())
  }

  fn mutate(
    collection: &CollectionRef,
    apply: impl FnOnce(
      &mut Vec<Task>
    ) -> Result<
      (),
      PersistenceError
    >
  ) -> Result<(), PersistenceError> {
    let mut records =
      Self::read(collection)?;
    apply(&mut records)?;
    Self::write(collection, &records)
  }
}

impl RecordStore for LocalStorageStore {
  fn create_record(
    &mut self,
    collection: &CollectionRef,
    record: &Task
  ) -> Result<(), PersistenceError> {
    Self::mutate(collection, |records| {
      if records
        .iter()
        .any(|t| t.id == record.id)
      {
        return Err(
          PersistenceError::DuplicateId(
            record.id.clone()
          )
        );
      }
      records.push(record.clone());
      Ok(())
    })
  }

  fn change_record(
    &mut self,
    collection: &CollectionRef,
    id: &TaskId,
    patch: &TaskPatch
  ) -> Result<(), PersistenceError> {
    Self::mutate(collection, |records| {
      let task = records
        .iter_mut()
        .find(|t| &t.id == id)
        .ok_or_else(|| {
          PersistenceError::NotFound(
            id.clone()
          )
        })?;
      task.apply(patch);
      Ok(())
    })
  }

  fn delete_record(
    &mut self,
    collection: &CollectionRef,
    id: &TaskId
  ) -> Result<(), PersistenceError> {
    Self::mutate(collection, |records| {
      let before = records.len();
      records.retain(|t| &t.id != id);
      if records.len() == before {
        return Err(
          PersistenceError::NotFound(
            id.clone()
          )
        );
      }
      Ok(())
    })
  }

  fn snapshot(
    &self,
    collection: &CollectionRef
  ) -> Result<Vec<Task>, PersistenceError>
  {
    Self::read(collection)
  }
}
