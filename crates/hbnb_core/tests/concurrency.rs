use hbnb_core::{
    ConflictError, Country, DataError, DataManager, EntityId, EntityKind, FileStore,
    ManagerOptions, MemoryStore, NewUser, Record, Store, StoreResult, WriteOp,
};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password: "pw".to_string(),
        first_name: "Race".to_string(),
        last_name: "Condition".to_string(),
        ..NewUser::default()
    }
}

#[test]
fn racing_registrations_with_same_email_admit_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("file_storage.json")).unwrap();
    let manager = Arc::new(DataManager::new(store));
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.create_user(new_user("same@example.com"))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(
        |err| matches!(err, DataError::Conflict(ConflictError::DuplicateEmail))
    ));
    assert_eq!(manager.count(EntityKind::User).unwrap(), 1);
}

#[test]
fn distinct_writers_all_land() {
    let manager = Arc::new(DataManager::new(MemoryStore::new()));

    let handles: Vec<_> = (0..6)
        .map(|index| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                manager
                    .create_user(new_user(&format!("user{index}@example.com")))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.count(EntityKind::User).unwrap(), 6);
}

/// Store whose first write parks until released, holding the manager lock.
struct GatedStore {
    inner: MemoryStore,
    entered: mpsc::Sender<()>,
    release: Mutex<mpsc::Receiver<()>>,
    gated: bool,
}

impl Store for GatedStore {
    fn apply(&mut self, ops: Vec<WriteOp>) -> StoreResult<()> {
        if self.gated {
            self.gated = false;
            self.entered.send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
        self.inner.apply(ops)
    }

    fn load_record(&self, kind: EntityKind, id: EntityId) -> StoreResult<Option<Record>> {
        self.inner.load_record(kind, id)
    }

    fn load_all_records(&self, kind: EntityKind) -> StoreResult<Vec<Record>> {
        self.inner.load_all_records(kind)
    }
}

#[test]
fn bounded_lock_wait_reports_busy() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let store = GatedStore {
        inner: MemoryStore::new(),
        entered: entered_tx,
        release: Mutex::new(release_rx),
        gated: true,
    };
    let manager = Arc::new(DataManager::with_options(
        store,
        ManagerOptions {
            lock_timeout: Some(Duration::from_millis(20)),
        },
    ));

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.create_country("Japan", "JP"))
    };
    entered_rx.recv().unwrap();

    let err = manager.create_country("France", "FR").unwrap_err();
    assert!(matches!(err, DataError::Busy { waited } if waited >= Duration::from_millis(20)));
    let err = manager.count(EntityKind::Country).unwrap_err();
    assert!(matches!(err, DataError::Busy { .. }));

    release_tx.send(()).unwrap();
    writer.join().unwrap().unwrap();
    assert_eq!(manager.count(EntityKind::Country).unwrap(), 1);
}

/// Store that panics on the first write touching `panic_on`.
struct PanickingStore {
    inner: MemoryStore,
    panic_on: Option<EntityKind>,
}

impl Store for PanickingStore {
    fn apply(&mut self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let hit = ops
            .iter()
            .any(|op| matches!(op, WriteOp::Put { kind, .. } if Some(*kind) == self.panic_on));
        if hit {
            self.panic_on = None;
            panic!("store write crashed");
        }
        self.inner.apply(ops)
    }

    fn load_record(&self, kind: EntityKind, id: EntityId) -> StoreResult<Option<Record>> {
        self.inner.load_record(kind, id)
    }

    fn load_all_records(&self, kind: EntityKind) -> StoreResult<Vec<Record>> {
        self.inner.load_all_records(kind)
    }
}

fn assert_recovers_after_writer_panic(lock_timeout: Option<Duration>) {
    let store = PanickingStore {
        inner: MemoryStore::new(),
        panic_on: Some(EntityKind::Amenity),
    };
    let manager = Arc::new(DataManager::with_options(store, ManagerOptions { lock_timeout }));
    let japan = manager.create_country("Japan", "JP").unwrap();

    let crashed = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.create_amenity("Sauna", "")).join()
    };
    assert!(crashed.is_err());

    assert_eq!(manager.count(EntityKind::Amenity).unwrap(), 0);
    assert_eq!(manager.list::<Country>().unwrap(), vec![japan]);

    manager.create_country("France", "FR").unwrap();
    manager.create_amenity("Sauna", "").unwrap();
    assert_eq!(manager.count(EntityKind::Country).unwrap(), 2);
    assert_eq!(manager.count(EntityKind::Amenity).unwrap(), 1);
}

#[test]
fn writer_panic_does_not_wedge_the_manager() {
    assert_recovers_after_writer_panic(None);
}

#[test]
fn writer_panic_does_not_wedge_the_manager_with_bounded_wait() {
    assert_recovers_after_writer_panic(Some(Duration::from_millis(50)));
}
