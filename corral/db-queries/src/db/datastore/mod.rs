// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primary control plane interface for database read and write operations

use crate::db;
use crate::db::pool::DbConnection;
use async_bb8_diesel::ConnectionManager;
use corral_common::api::external::Error;
use slog::Logger;
use std::sync::Arc;

mod constraints;
mod link_layer;
mod machine;
mod network;
mod sequence;

#[cfg(any(test, feature = "testing"))]
pub mod pub_test_utils;

pub type DataStoreConnection<'a> =
    bb8::PooledConnection<'a, ConnectionManager<DbConnection>>;

pub struct DataStore {
    log: Logger,
    pool: Arc<db::Pool>,
}

// The majority of `DataStore`'s methods live in the per-domain modules as
// a side effect of the issue described in
// https://github.com/rust-lang/rust/issues/47990.
impl DataStore {
    pub fn new(log: &Logger, pool: Arc<db::Pool>) -> Self {
        DataStore { log: log.new(o!("component" => "datastore")), pool }
    }

    /// Returns a connection from the pool.
    ///
    /// The pool holds a single connection, so callers queue here when the
    /// database is busy rather than racing SQLite's write lock.
    pub(crate) async fn pool_connection(
        &self,
    ) -> Result<DataStoreConnection<'_>, Error> {
        self.pool.pool().get().await.map_err(|err| {
            warn!(self.log, "failed to access DB connection"; "error" => %err);
            Error::unavail(&format!("Failed to access DB connection: {}", err))
        })
    }
}
