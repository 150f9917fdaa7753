//! Orchestration tests over real SQLite and real files
//!
//! Checks that the relational store, counter file and mirror agree after
//! every successful mutation, and that identifiers are never reused.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use raspberry::error::Error;
use raspberry::models::{MovieFilter, PageRequest};

use crate::common::{movie_input, TestCatalog, SEED_CSV};

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_after_seed_continues_numbering() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    let record = service
        .create_movie(movie_input(2020, "  Padded Title  ", "New Producer", true))
        .unwrap();

    assert_eq!(record.id, 6);
    assert_eq!(record.title, "Padded Title");
    assert_eq!(service.get_movie(6).unwrap(), record);
    assert!(catalog.counter_content().contains("<lastId>6</lastId>"));
    assert_eq!(
        catalog.mirror_lines().last().unwrap(),
        "6;2020;Padded Title;Test Studio;New Producer;yes;;"
    );
}

#[tokio::test]
async fn test_rejected_input_touches_nothing() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;
    let mirror_before = catalog.mirror_content();

    let err = service
        .create_movie(movie_input(2020, "   ", "Nobody", false))
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(catalog.counter_content().contains("<lastId>5</lastId>"));
    assert_eq!(catalog.mirror_content(), mirror_before);
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_ids() {
    let catalog = TestCatalog::new();
    let service = Arc::new(catalog.ready_service().await);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                (0..5)
                    .map(|i| {
                        service
                            .create_movie(movie_input(
                                2000 + i,
                                &format!("Worker {worker} film {i}"),
                                "Crowd",
                                false,
                            ))
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: BTreeSet<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(ids, (1..=20).collect());
    assert_eq!(catalog.mirror_lines().len(), 20);
    assert!(catalog.counter_content().contains("<lastId>20</lastId>"));
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_rewrites_store_and_mirror() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    service
        .update_movie(3, movie_input(1995, "Loser Renamed", "X", true))
        .unwrap();

    assert!(service.get_movie(3).unwrap().winner);
    let lines: Vec<String> = catalog
        .mirror_lines()
        .into_iter()
        .filter(|l| l.starts_with("3;"))
        .collect();
    assert_eq!(lines, vec!["3;1995;Loser Renamed;Test Studio;X;yes;;"]);
    assert!(catalog.counter_content().contains("<lastId>5</lastId>"));
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    let err = service
        .update_movie(42, movie_input(1995, "Ghost", "X", false))
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_then_create_never_reuses_id() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    service.delete_movie(5).unwrap();
    assert!(matches!(service.get_movie(5), Err(Error::NotFound(_))));
    assert!(!catalog.mirror_lines().iter().any(|l| l.starts_with("5;")));

    let record = service
        .create_movie(movie_input(2021, "Replacement", "Y", false))
        .unwrap();
    assert_eq!(record.id, 6);
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    service.delete_movie(1).unwrap();
    assert!(matches!(service.delete_movie(1), Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_mirror_missing_line_surfaces_after_store_delete() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    // Hand-edit the mirror so it no longer carries id 2
    let edited: String = catalog
        .mirror_content()
        .lines()
        .filter(|l| !l.starts_with("2;"))
        .map(|l| format!("{l}\n"))
        .collect();
    std::fs::write(catalog.mirror_path(), edited).unwrap();

    let err = service.delete_movie(2).unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert!(matches!(service.get_movie(2), Err(Error::NotFound(_))));
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_intervals_after_seed() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    let report = service.get_intervals().unwrap();

    assert_eq!(report.min.len(), 1);
    assert_eq!(report.min[0].producer, "X");
    assert_eq!(report.min[0].interval, 1);
    assert_eq!(report.max.len(), 1);
    assert_eq!(report.max[0].producer, "Y");
    assert_eq!(report.max[0].previous_win, 2002);
    assert_eq!(report.max[0].following_win, 2015);
}

#[tokio::test]
async fn test_list_filters_and_pages() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    let winners = service
        .list_movies(
            &MovieFilter {
                winner: Some(true),
                ..Default::default()
            },
            PageRequest::new(0, 2).unwrap(),
        )
        .unwrap();
    assert_eq!(winners.total, 4);
    assert_eq!(winners.items.len(), 2);

    let by_title = service
        .list_movies(
            &MovieFilter {
                title: Some("second".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .unwrap();
    let ids: Vec<i64> = by_title.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 5]);
}

#[tokio::test]
async fn test_rebuild_mirror_restores_lost_lines() {
    let catalog = TestCatalog::with_seed(SEED_CSV);
    let service = catalog.ready_service().await;

    std::fs::write(catalog.mirror_path(), "id;year;title;studios;producers;winner;;\n").unwrap();

    assert_eq!(service.rebuild_mirror().unwrap(), 5);
    assert_eq!(catalog.mirror_lines().len(), 5);
}
