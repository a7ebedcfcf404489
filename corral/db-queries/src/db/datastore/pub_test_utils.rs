// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test support code that can be enabled by dependencies via this crate's
//! `testing` feature.
//!
//! This feature should only be enabled under `dev-dependencies` to avoid
//! this test support code leaking into release binaries.

use crate::context::OpContext;
use crate::db;
use crate::db::DataStore;
use async_bb8_diesel::AsyncSimpleConnection;
use camino_tempfile::Utf8TempDir;
use slog::Drain;
use slog::Logger;
use std::sync::Arc;

/// A temporary database with a schema-initialized [`DataStore`] attached.
///
/// The database file lives in a temp directory removed on drop.
pub struct TestDatabase {
    _dir: Utf8TempDir,
    config: db::Config,
    log: Logger,
    opctx: OpContext,
    datastore: Arc<DataStore>,
}

impl TestDatabase {
    pub fn opctx(&self) -> &OpContext {
        &self.opctx
    }

    pub fn datastore(&self) -> &Arc<DataStore> {
        &self.datastore
    }

    /// Opens a second datastore over the same database file, simulating a
    /// process restart. The original datastore remains usable.
    pub async fn reopen_datastore(&self) -> Arc<DataStore> {
        let pool = Arc::new(db::Pool::new(&self.log, &self.config));
        Arc::new(DataStore::new(&self.log, pool))
    }
}

/// Constructs a logger that emits to stdout, where cargo's test harness
/// captures it per test.
pub fn test_logger(test_name: &str) -> Logger {
    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("test" => test_name.to_string()))
}

/// Constructs a DataStore for use in test suites: a fresh SQLite database
/// in a temp directory with the full schema and seeded lookup tables
/// applied.
pub async fn datastore_test(test_name: &str) -> TestDatabase {
    let log = test_logger(test_name);
    let dir = Utf8TempDir::new().expect("failed to create temp dir");
    let config = db::Config { path: dir.path().join("corral.db") };

    let pool = Arc::new(db::Pool::new(&log, &config));
    {
        let conn = pool.pool().get().await.expect("failed to connect");
        conn.batch_execute_async(db::model::DBINIT_SQL)
            .await
            .expect("failed to initialize schema");
    }
    let datastore = Arc::new(DataStore::new(&log, pool));
    let opctx = OpContext::for_tests(log.new(o!()));

    TestDatabase { _dir: dir, config, log, opctx, datastore }
}
