//! Common test utilities

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use raspberry::config::Config;
use raspberry::models::MovieInput;
use raspberry::service::MovieService;
use raspberry::utils::RetryConfig;
use tempfile::TempDir;

/// Small seed mirror: X wins in 1990 and 1991, Y in 2002 and 2015
pub const SEED_CSV: &str = "id;year;title;studios;producers;winner;;\n\
1;1990;First X;Studio A;X;yes;;\n\
2;1991;Second X;Studio A;X;yes;;\n\
3;1995;Loser;Studio B;X;;;\n\
4;2002;First Y;Studio C;Y and Z;yes;;\n\
5;2015;Second Y;Studio C;Y;yes;;\n";

/// A catalog whose three stores all live in a temporary directory
pub struct TestCatalog {
    pub dir: TempDir,
    pub config: Config,
}

impl TestCatalog {
    /// Empty catalog without a seed mirror
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.database.sqlite_path = dir.path().join("data").join("movies.db");
        config.storage.counter_path = dir.path().join("data").join("counter.xml");
        config.storage.mirror_path = dir.path().join("data").join("movielist.csv");
        config.storage.mirror_seed_path = None;
        config.bootstrap.base_delay_ms = 1;
        config.bootstrap.max_delay_ms = 2;
        Self { dir, config }
    }

    /// Catalog whose mirror is seeded from `seed`
    pub fn with_seed(seed: &str) -> Self {
        let mut catalog = Self::new();
        let seed_path = catalog.dir.path().join("seed.csv");
        fs::write(&seed_path, seed).unwrap();
        catalog.config.storage.mirror_seed_path = Some(seed_path);
        catalog
    }

    /// A fresh service over the catalog's files (simulates a process start)
    pub fn service(&self) -> MovieService {
        MovieService::from_config(&self.config).unwrap()
    }

    /// A service that has already run startup reconciliation
    pub async fn ready_service(&self) -> MovieService {
        let service = self.service();
        service.initialize(self.retry()).await.unwrap();
        service
    }

    pub fn retry(&self) -> RetryConfig {
        self.config.bootstrap.retry_config()
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.config.storage.mirror_path.clone()
    }

    pub fn mirror_content(&self) -> String {
        fs::read_to_string(&self.config.storage.mirror_path).unwrap()
    }

    pub fn counter_content(&self) -> String {
        fs::read_to_string(&self.config.storage.counter_path).unwrap()
    }

    /// Data lines of the mirror, header excluded
    pub fn mirror_lines(&self) -> Vec<String> {
        self.mirror_content()
            .lines()
            .skip(1)
            .map(str::to_string)
            .collect()
    }
}

/// Create a movie input with default studio
pub fn movie_input(year: i32, title: &str, producers: &str, winner: bool) -> MovieInput {
    MovieInput {
        year,
        title: title.to_string(),
        studios: "Test Studio".to_string(),
        producers: producers.to_string(),
        winner,
    }
}
