// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::schema::{
    constraint_space, constraint_tag, constraint_zone, machine_constraint,
};
use crate::SqlUuid;
use corral_common::api::external;
use serde::{Deserialize, Serialize};

/// Decodes a `container_type` lookup-table id.
///
/// The datastore resolves names to ids through the table at write time
/// (so a missing row fails the constraint write); this mapping covers
/// the read-back direction only.
pub fn container_type_from_id(
    id: i32,
) -> Result<external::ContainerType, String> {
    match id {
        1 => Ok(external::ContainerType::Lxd),
        other => Err(format!("unrecognized container type id: {}", other)),
    }
}

/// The scalar portion of a machine's constraints. Tags, spaces and zones
/// live in their own collection tables.
#[derive(
    Queryable, Insertable, Selectable, Clone, Debug, Serialize, Deserialize,
)]
#[diesel(table_name = machine_constraint)]
pub struct MachineConstraint {
    pub uuid: SqlUuid,
    pub arch: Option<i32>,
    pub cpu_cores: Option<i64>,
    pub cpu_power: Option<i64>,
    pub mem_mib: Option<i64>,
    pub root_disk_mib: Option<i64>,
    pub root_disk_source: Option<String>,
    pub instance_role: Option<String>,
    pub instance_type: Option<String>,
    pub container_type_id: Option<i32>,
    pub virt_type: Option<String>,
    pub allocate_public_ip: Option<bool>,
    pub image_id: Option<String>,
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = constraint_tag)]
pub struct ConstraintTag {
    pub constraint_uuid: SqlUuid,
    pub tag: String,
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = constraint_space)]
pub struct ConstraintSpace {
    pub constraint_uuid: SqlUuid,
    pub space: String,
    pub exclude: bool,
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = constraint_zone)]
pub struct ConstraintZone {
    pub constraint_uuid: SqlUuid,
    pub zone: String,
}
