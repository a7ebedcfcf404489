// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods for namespaced sequence allocation.

use super::DataStore;
use crate::context::OpContext;
use crate::db;
use crate::db::error::public_error_from_diesel;
use crate::db::error::ErrorHandler;
use async_bb8_diesel::AsyncRunQueryDsl;
use corral_common::api::external::Error;
use diesel::prelude::*;

impl DataStore {
    /// Returns the next value of the named counter: 0 on first use, then
    /// strictly increasing.
    ///
    /// The increment commits on its own, outside any transaction the
    /// caller may be assembling. A placement that later aborts therefore
    /// burns the value instead of handing it to the next caller, which is
    /// what keeps machine names unique across failed attempts.
    pub async fn next_sequence_value(
        &self,
        opctx: &OpContext,
        namespace: &str,
    ) -> Result<u64, Error> {
        use db::schema::sequence::dsl;

        let value: i64 = diesel::insert_into(dsl::sequence)
            .values((
                dsl::namespace.eq(namespace.to_string()),
                dsl::value.eq(0_i64),
            ))
            .on_conflict(dsl::namespace)
            .do_update()
            .set(dsl::value.eq(dsl::value + 1))
            .returning(dsl::value)
            .get_result_async(&*self.pool_connection().await?)
            .await
            .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))?;

        debug!(
            opctx.log,
            "allocated sequence value";
            "namespace" => namespace,
            "value" => value,
        );

        u64::try_from(value).map_err(|_| {
            Error::internal_error(&format!(
                "sequence {:?} produced negative value {}",
                namespace, value
            ))
        })
    }
}

#[cfg(test)]
mod test {
    use crate::db::datastore::pub_test_utils::datastore_test;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequence_values_are_zero_based_and_monotonic() {
        let db = datastore_test("sequence_values_are_zero_based_and_monotonic")
            .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        for expected in 0..5 {
            let value = datastore
                .next_sequence_value(opctx, "machine")
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
    }

    #[tokio::test]
    async fn test_namespaces_count_independently() {
        let db = datastore_test("namespaces_count_independently").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        assert_eq!(
            datastore.next_sequence_value(opctx, "machine").await.unwrap(),
            0
        );
        assert_eq!(
            datastore.next_sequence_value(opctx, "machine").await.unwrap(),
            1
        );
        assert_eq!(
            datastore
                .next_sequence_value(opctx, "machine_container_0_lxd")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_sequence_survives_datastore_restart() {
        let db = datastore_test("sequence_survives_datastore_restart").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        for _ in 0..3 {
            datastore.next_sequence_value(opctx, "machine").await.unwrap();
        }

        // A new pool over the same database file sees the durable
        // counter, not a fresh one.
        let reopened = db.reopen_datastore().await;
        assert_eq!(
            reopened.next_sequence_value(opctx, "machine").await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_concurrent_allocations_never_collide() {
        let db = datastore_test("concurrent_allocations_never_collide").await;
        let opctx_log = db.opctx().log.clone();

        const TASKS: usize = 4;
        const PER_TASK: usize = 10;

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let datastore = Arc::clone(db.datastore());
            let log = opctx_log.clone();
            handles.push(tokio::spawn(async move {
                let opctx = crate::context::OpContext::for_tests(log);
                let mut values = Vec::new();
                for _ in 0..PER_TASK {
                    values.push(
                        datastore
                            .next_sequence_value(&opctx, "machine")
                            .await
                            .unwrap(),
                    );
                }
                values
            }));
        }

        let mut all = BTreeSet::new();
        for handle in handles {
            for value in handle.await.unwrap() {
                assert!(all.insert(value), "value {} issued twice", value);
            }
        }
        assert_eq!(all.len(), TASKS * PER_TASK);
        assert_eq!(*all.iter().max().unwrap(), (TASKS * PER_TASK - 1) as u64);
    }
}
