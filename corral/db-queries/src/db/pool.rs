// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Database connection pooling

use super::Config as DbConfig;
use async_bb8_diesel::ConnectionError;
use async_bb8_diesel::ConnectionManager;

pub use super::pool_connection::DbConnection;

/// SQLite permits one writer at a time. A pool of exactly one connection
/// serializes writers at the pool instead of surfacing SQLITE_BUSY to
/// whichever caller loses the race, and it is what makes concurrent
/// sequence allocations safe (they queue rather than interleave).
const MAX_CONNECTIONS: u32 = 1;

/// Wrapper around a database connection pool.
///
/// Expected to be used as the primary interface to the database.
pub struct Pool {
    pool: bb8::Pool<ConnectionManager<DbConnection>>,
}

impl Pool {
    pub fn new(log: &slog::Logger, db_config: &DbConfig) -> Self {
        Self::new_builder(log, db_config, bb8::Builder::new())
    }

    pub fn new_failfast_for_tests(
        log: &slog::Logger,
        db_config: &DbConfig,
        timeout: std::time::Duration,
    ) -> Self {
        Self::new_builder(
            log,
            db_config,
            bb8::Builder::new().connection_timeout(timeout),
        )
    }

    fn new_builder(
        log: &slog::Logger,
        db_config: &DbConfig,
        builder: bb8::Builder<ConnectionManager<DbConnection>>,
    ) -> Self {
        let path = db_config.path.to_string();
        let log = log.new(o!(
            "database_path" => path.clone(),
            "component" => "db::Pool"
        ));
        info!(&log, "database connection pool");
        let error_sink = LoggingErrorSink::new(log);
        let manager = ConnectionManager::<DbConnection>::new(path);
        let pool = builder
            .max_size(MAX_CONNECTIONS)
            .connection_customizer(Box::new(
                super::pool_connection::ConnectionCustomizer::new(),
            ))
            .error_sink(Box::new(error_sink))
            .build_unchecked(manager);
        Pool { pool }
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &bb8::Pool<ConnectionManager<DbConnection>> {
        &self.pool
    }
}

#[derive(Clone, Debug)]
struct LoggingErrorSink {
    log: slog::Logger,
}

impl LoggingErrorSink {
    fn new(log: slog::Logger) -> LoggingErrorSink {
        LoggingErrorSink { log }
    }
}

impl bb8::ErrorSink<ConnectionError> for LoggingErrorSink {
    fn sink(&self, error: ConnectionError) {
        error!(
            &self.log,
            "database connection error";
            "error_message" => #%error
        );
    }

    fn boxed_clone(&self) -> Box<dyn bb8::ErrorSink<ConnectionError>> {
        Box::new(self.clone())
    }
}
