// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Customization that happens on each connection as they're acquired.

use async_bb8_diesel::AsyncSimpleConnection;
use async_bb8_diesel::Connection;
use async_bb8_diesel::ConnectionError;
use async_trait::async_trait;
use diesel::SqliteConnection;

pub type DbConnection = SqliteConnection;

/// Batch statement applied to every connection before it is handed out.
///
/// SQLite does not enforce foreign keys unless asked, and the default
/// busy handler returns SQLITE_BUSY immediately. WAL keeps readers from
/// blocking the (single) writer.
pub const CONNECTION_SETUP_SQL: &str = "PRAGMA foreign_keys = ON; \
     PRAGMA busy_timeout = 5000; \
     PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL;";

#[derive(Debug)]
pub(crate) struct ConnectionCustomizer {}

impl ConnectionCustomizer {
    pub(crate) fn new() -> ConnectionCustomizer {
        ConnectionCustomizer {}
    }
}

#[async_trait]
impl bb8::CustomizeConnection<Connection<DbConnection>, ConnectionError>
    for ConnectionCustomizer
{
    async fn on_acquire(
        &self,
        conn: &mut Connection<DbConnection>,
    ) -> Result<(), ConnectionError> {
        conn.batch_execute_async(CONNECTION_SETUP_SQL)
            .await
            .map_err(|e| e.into())
    }
}
