// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facilities for working with the corral database

mod config;
// This is marked public for use by the integration tests
pub mod datastore;
// This is marked public because the error types are used by callers that
// run their own queries inside datastore transactions.
pub mod error;
mod pool;
mod pool_connection;

/// Batch statement applied to every new connection.
// This is `pub` so tests that don't go through our connection pool can
// configure their connections the same way pooled connections are.
pub use pool_connection::CONNECTION_SETUP_SQL;

pub use corral_db_model as model;
pub use corral_db_model::schema;

pub use config::Config;
pub use datastore::DataStore;
pub use pool::Pool;
pub use pool_connection::DbConnection;
