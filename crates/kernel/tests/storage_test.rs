#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Local storage backend tests against a temporary directory.

mod common;

use std::sync::Arc;

use quire_kernel::file::{FileStorage, LocalFileStorage, StorageError};

#[tokio::test]
async fn save_get_delete() {
    let dir = common::temp_dir("storage");
    let storage = LocalFileStorage::new(&dir).await.unwrap();
    assert!(dir.is_dir());

    let key = storage.save("My Photo.JPG", b"jpeg bytes").await.unwrap();
    assert!(key.ends_with("-my-photo.jpg"), "unexpected key {key}");
    assert_eq!(storage.get(&key).await.unwrap(), b"jpeg bytes");

    storage.delete(&key).await.unwrap();
    assert!(matches!(
        storage.get(&key).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(storage.delete(&key).await.unwrap_err().is_not_found());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn same_name_never_overwrites() {
    let dir = common::temp_dir("storage");
    let storage = LocalFileStorage::new(&dir).await.unwrap();

    let first = storage.save("notes.txt", b"one").await.unwrap();
    let second = storage.save("notes.txt", b"two").await.unwrap();
    assert_ne!(first, second);
    assert_eq!(storage.get(&first).await.unwrap(), b"one");
    assert_eq!(storage.get(&second).await.unwrap(), b"two");

    // No temporary files are left behind.
    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_of_one_name_get_distinct_keys() {
    let dir = common::temp_dir("storage");
    let storage = Arc::new(LocalFileStorage::new(&dir).await.unwrap());

    for round in 0..50 {
        let name = format!("race-{round}.png");
        let saves: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|payload| {
                let storage = storage.clone();
                let name = name.clone();
                tokio::spawn(async move {
                    let key = storage.save(&name, payload.as_bytes()).await.unwrap();
                    (key, payload)
                })
            })
            .collect();

        let mut results = Vec::new();
        for save in saves {
            results.push(save.await.unwrap());
        }

        assert_ne!(results[0].0, results[1].0, "round {round} reused a key");
        for (key, payload) in &results {
            assert_eq!(storage.get(key).await.unwrap(), payload.as_bytes(), "round {round}");
        }
    }

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn put_replaces_fixed_keys() {
    let dir = common::temp_dir("storage");
    let storage = LocalFileStorage::new(&dir).await.unwrap();

    storage.put("favicon.ico", b"old").await.unwrap();
    storage.put("favicon.ico", b"new").await.unwrap();
    assert_eq!(storage.get("favicon.ico").await.unwrap(), b"new");
    assert!(matches!(
        storage.put("../favicon.ico", b"x").await,
        Err(StorageError::InvalidKey(_))
    ));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn keys_cannot_escape_the_root() {
    let dir = common::temp_dir("storage");
    let storage = LocalFileStorage::new(&dir).await.unwrap();

    for key in ["../secret", "nested/file.txt", ".env", ""] {
        assert!(
            matches!(storage.get(key).await, Err(StorageError::InvalidKey(_))),
            "{key:?} should be rejected"
        );
    }

    let key = storage.save("../../etc/passwd", b"x").await.unwrap();
    assert!(!key.contains('/'));
    assert!(dir.join(&key).is_file());

    std::fs::remove_dir_all(&dir).unwrap();
}
