pub mod test_utils;

use route_tracker_core::{
    file_store::{BlobStore, FileRouteRepository},
    route::Route,
    route_repository::{RouteRepository, StorageError},
};
use std::fs;
use tempdir::TempDir;

#[test]
fn blob_store() {
    let temp_dir = TempDir::new("file_store-blob_store").unwrap();
    let store = BlobStore::open(temp_dir.path().join("images/")).unwrap();

    assert!(!store.exists("avatar.png").unwrap());
    assert_eq!(store.fetch("avatar.png").unwrap(), None);
    assert!(!store.remove("avatar.png").unwrap());

    store.replace("avatar.png", &[0x89, b'P', b'N', b'G']).unwrap();
    assert!(store.exists("avatar.png").unwrap());
    store.replace("avatar.png", b"second").unwrap();
    assert_eq!(store.fetch("avatar.png").unwrap().unwrap(), b"second");

    // no temp files left behind
    let names: Vec<String> = fs::read_dir(temp_dir.path().join("images/"))
        .unwrap()
        .map(|x| x.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["avatar.png".to_string()]);

    assert!(store.remove("avatar.png").unwrap());
    assert_eq!(store.fetch("avatar.png").unwrap(), None);
}

#[test]
fn route_repository() {
    let temp_dir = TempDir::new("file_store-route_repository").unwrap();
    let mut repository = FileRouteRepository::open(temp_dir.path()).unwrap();
    assert_eq!(repository.fetch_last().unwrap(), Route::new());

    let a = test_utils::sample_route(30);
    let b = test_utils::sample_route(3);
    repository.save(&a).unwrap();
    assert_eq!(repository.fetch_last().unwrap(), a);
    repository.save(&b).unwrap();
    assert_eq!(repository.fetch_last().unwrap(), b);

    // reopen
    let mut repository = FileRouteRepository::open(temp_dir.path()).unwrap();
    assert_eq!(repository.fetch_last().unwrap(), b);

    // stored as plain json for other readers
    let raw = fs::read_to_string(temp_dir.path().join("last_route.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 3);
    assert!(parsed[0]["latitude"].is_f64());
    assert!(parsed[0]["longitude"].is_f64());
}

#[test]
fn interrupted_write_keeps_previous_route() {
    let temp_dir = TempDir::new("file_store-interrupted_write").unwrap();
    let mut repository = FileRouteRepository::open(temp_dir.path()).unwrap();
    let a = test_utils::sample_route(5);
    repository.save(&a).unwrap();

    // what a crash in the middle of `replace` leaves on disk
    fs::write(
        temp_dir.path().join(".tmp-last_route.json-abcd1234"),
        b"[{\"latitude\":31.2",
    )
    .unwrap();
    assert_eq!(repository.fetch_last().unwrap(), a);

    repository.save(&test_utils::sample_route(6)).unwrap();
    assert_eq!(repository.fetch_last().unwrap().len(), 6);
}

#[test]
fn corrupted_file() {
    let temp_dir = TempDir::new("file_store-corrupted_file").unwrap();
    let mut repository = FileRouteRepository::open(temp_dir.path()).unwrap();
    fs::write(temp_dir.path().join("last_route.json"), b"not json").unwrap();
    match repository.fetch_last() {
        Err(StorageError::Corrupted(_)) => (),
        other => panic!("unexpected: {:?}", other),
    }
}

#[cfg(unix)]
#[test]
fn unavailable_storage() {
    let temp_dir = TempDir::new("file_store-unavailable_storage").unwrap();
    let dir = temp_dir.path().join("routes/");
    let mut repository = FileRouteRepository::open(&dir).unwrap();
    repository.save(&test_utils::sample_route(2)).unwrap();

    // the folder disappears from under us
    fs::remove_dir_all(&dir).unwrap();
    match repository.save(&test_utils::sample_route(3)) {
        Err(e) => assert!(e.is_unavailable()),
        Ok(()) => panic!("save should fail"),
    }
    assert_eq!(repository.fetch_last().unwrap(), Route::new());
}
