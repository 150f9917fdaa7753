//! Startup reconciliation tests
//!
//! 1. Empty store imports the seed mirror
//! 2. Restart does not re-import or move the counter
//! 3. Counter behind the store is raised
//! 4. Counter ahead of the store is kept
//! 5. Nothing to import leaves a header-only mirror
//! 6. A single bootstrap attempt is enough for a fresh database

use std::fs;

use raspberry::storage::{IdAllocator, MovieRepository, SqliteMovieRepository};

use crate::common::{movie_input, TestCatalog, SEED_CSV};

#[tokio::test]
async fn test_empty_store_imports_seed() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.service();

    let report = service.initialize(catalog.retry()).await.unwrap();

    assert_eq!(report.imported, 5);
    assert_eq!(report.counter, 5);
    assert!(report.mirror_rebuilt);
    assert_eq!(catalog.mirror_lines().len(), 5);
    assert!(catalog.counter_content().contains("<lastId>5</lastId>"));
    assert_eq!(service.get_movie(4).unwrap().producers, "Y and Z");
}

#[tokio::test]
async fn test_restart_is_idempotent() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    catalog.ready_service().await;
    let mirror_before = catalog.mirror_content();

    let report = catalog.service().initialize(catalog.retry()).await.unwrap();

    assert_eq!(report.imported, 0);
    assert_eq!(report.counter, 5);
    assert!(!report.mirror_rebuilt);
    assert_eq!(catalog.mirror_content(), mirror_before);
}

#[tokio::test]
async fn test_counter_behind_store_is_raised() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    catalog.ready_service().await;

    IdAllocator::new(&catalog.config.storage.counter_path, 4)
        .reset(2)
        .unwrap();

    let service = catalog.ready_service().await;
    let record = service
        .create_movie(movie_input(2020, "After Restart", "Q", false))
        .unwrap();

    assert_eq!(record.id, 6);
}

#[tokio::test]
async fn test_counter_ahead_of_store_is_kept() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    catalog.ready_service().await;

    IdAllocator::new(&catalog.config.storage.counter_path, 4)
        .reset(100)
        .unwrap();

    let service = catalog.ready_service().await;
    let record = service
        .create_movie(movie_input(2020, "Far Ahead", "Q", false))
        .unwrap();

    assert_eq!(record.id, 101);
}

#[tokio::test]
async fn test_nothing_to_import() {
    let catalog = TestCatalog::new();
    let service = catalog.ready_service().await;

    assert_eq!(
        catalog.mirror_content(),
        "id;year;title;studios;producers;winner;;\n"
    );
    let report = service.get_intervals().unwrap();
    assert!(report.min.is_empty());
    assert!(report.max.is_empty());
}

#[tokio::test]
async fn test_schema_created_on_fresh_database() {
    let catalog = TestCatalog::new();
    catalog.ready_service().await;

    let repo = SqliteMovieRepository::open(&catalog.config.database.sqlite_path).unwrap();
    assert_eq!(repo.count().unwrap(), 0);
    assert!(fs::metadata(&catalog.config.database.sqlite_path).is_ok());
}

#[tokio::test]
async fn test_single_bootstrap_attempt_on_fresh_database() {
    let mut catalog = TestCatalog::with_seed(SEED_CSV);
    catalog.config.bootstrap.max_attempts = 1;

    let report = catalog.service().initialize(catalog.retry()).await.unwrap();

    assert_eq!(report.imported, 5);
    assert_eq!(report.counter, 5);
}
