use checklist_core::datastore::JsonlStore;
use checklist_core::ids::SequentialIds;
use checklist_core::{
    CollectionRef, EditMode, Filter, ListView, RecordStore, ScopedListener, TaskCollection, TaskId,
};
use tempfile::tempdir;

fn open_view(dir: &std::path::Path) -> ListView<JsonlStore, String> {
    let store = JsonlStore::open(dir).expect("open datastore");
    let mut view = ListView::new(
        TaskCollection::new(CollectionRef::new("tasks"), store),
        Filter::All,
        Box::new(SequentialIds::new("t")),
        ScopedListener::detached(),
    );
    view.load().expect("load");
    view
}

#[test]
fn create_then_filter_scenario() {
    let temp = tempdir().expect("tempdir");
    let mut view = open_view(temp.path());

    let snap = view.snapshot();
    assert!(!snap.is_loading);
    assert!(snap.list.is_empty());

    view.set_draft("Buy milk");
    let id = view.submit().expect("create");
    assert_eq!(id, TaskId::from("t-1"));

    view.set_filter("completed").expect("filter");
    assert!(view.snapshot().list.is_empty());

    view.set_filter("all").expect("filter");
    let snap = view.snapshot();
    assert_eq!(snap.list.len(), 1);
    assert_eq!(snap.list[0].id, id);
    assert_eq!(snap.list[0].text, "Buy milk");
    assert!(!snap.list[0].completed);
}

#[test]
fn writes_survive_reopen() {
    let temp = tempdir().expect("tempdir");

    {
        let mut view = open_view(temp.path());
        view.set_draft("Buy milk");
        let milk = view.submit().expect("create");
        view.set_draft("Write paper");
        view.submit().expect("create");

        view.toggle_completed(&milk).expect("toggle");
        view.activate(milk);
        view.commit_edit("Buy oat milk").expect("commit");
        assert_eq!(view.edit_mode(), EditMode::Idle);
        view.unmount();
    }

    let store = JsonlStore::open(temp.path()).expect("reopen");
    let records = store
        .snapshot(&CollectionRef::new("tasks"))
        .expect("snapshot");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].text, "Buy oat milk");
    assert!(records[0].completed);
    assert_eq!(records[1].text, "Write paper");
    assert!(!records[1].completed);
}

#[test]
fn active_filter_twice_matches_once() {
    let temp = tempdir().expect("tempdir");
    let mut view = open_view(temp.path());
    let a = view.submit().expect("create");
    view.submit().expect("create");
    view.toggle_completed(&a).expect("toggle");

    view.set_filter("active").expect("filter");
    let once = view.snapshot();
    view.set_filter("active").expect("filter");
    let twice = view.snapshot();

    assert_eq!(once, twice);
    assert_eq!(twice.list.len(), 1);
}

#[test]
fn collections_are_separate_files() {
    let temp = tempdir().expect("tempdir");
    let mut store = JsonlStore::open(temp.path()).expect("open");
    let home = CollectionRef::new("home");
    let work = CollectionRef::new("work");

    store
        .create_record(
            &home,
            &checklist_core::Task::new_active(TaskId::from("h1"), "Dishes".to_string()),
        )
        .expect("create");

    assert!(store.collection_path(&home).exists());
    assert!(store.snapshot(&work).expect("snapshot").is_empty());
}
