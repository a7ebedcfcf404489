// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::schema::sequence;
use corral_common::api::external;

/// A durable per-namespace counter row. Values are zero-based and
/// strictly increasing; the row outlives any transaction that consumed a
/// value from it.
#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = sequence)]
pub struct Sequence {
    pub namespace: String,
    pub value: i64,
}

/// Namespace for top-level machine names.
pub const MACHINE_SEQUENCE_NAMESPACE: &str = "machine";

/// Namespace for containers of a given type under a given parent, so
/// each (parent, container type) pair counts from zero independently.
/// Machine names cannot contain '_', so the encoding is unambiguous.
pub fn container_sequence_namespace(
    parent: &external::MachineName,
    container_type: external::ContainerType,
) -> String {
    format!("machine_container_{}_{}", parent, container_type)
}
