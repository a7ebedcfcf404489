// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::impl_enum_type;
use crate::schema::{
    machine, machine_cloud_instance, machine_cloud_instance_status,
    machine_container_type, machine_parent, machine_placement,
    machine_platform, machine_requires_reboot, machine_status, net_node,
};
use crate::Name;
use crate::SqlUuid;
use chrono::{DateTime, Utc};
use corral_common::api::external;
use serde::{Deserialize, Serialize};

impl_enum_type!(
    #[derive(
        Clone,
        Copy,
        Debug,
        AsExpression,
        FromSqlRow,
        PartialEq,
        Serialize,
        Deserialize
    )]
    pub enum DbLife;

    Alive => 0
    Dying => 1
    Dead => 2
);

impl From<external::Life> for DbLife {
    fn from(life: external::Life) -> Self {
        match life {
            external::Life::Alive => DbLife::Alive,
            external::Life::Dying => DbLife::Dying,
            external::Life::Dead => DbLife::Dead,
        }
    }
}

impl From<DbLife> for external::Life {
    fn from(life: DbLife) -> Self {
        match life {
            DbLife::Alive => external::Life::Alive,
            DbLife::Dying => external::Life::Dying,
            DbLife::Dead => external::Life::Dead,
        }
    }
}

impl_enum_type!(
    #[derive(
        Clone,
        Copy,
        Debug,
        AsExpression,
        FromSqlRow,
        PartialEq,
        Serialize,
        Deserialize
    )]
    pub enum DbOsType;

    Ubuntu => 0
    Centos => 1
    GenericLinux => 2
);

impl From<external::OsType> for DbOsType {
    fn from(os: external::OsType) -> Self {
        match os {
            external::OsType::Ubuntu => DbOsType::Ubuntu,
            external::OsType::Centos => DbOsType::Centos,
            external::OsType::GenericLinux => DbOsType::GenericLinux,
        }
    }
}

impl_enum_type!(
    #[derive(
        Clone,
        Copy,
        Debug,
        AsExpression,
        FromSqlRow,
        PartialEq,
        Serialize,
        Deserialize
    )]
    pub enum DbMachineStatus;

    Pending => 0
    Started => 1
    Stopped => 2
    Down => 3
    Error => 4
);

/// Encodes an architecture to its platform-row code.
///
/// -1 is the "unknown" sentinel; it is legal only on machine_platform
/// rows (machines recorded before an instance exists, e.g. the charm
/// upload path). Constraint rows must reject `Unknown` before calling
/// this.
pub fn to_db_architecture(arch: external::Architecture) -> i32 {
    match arch {
        external::Architecture::Amd64 => 0,
        external::Architecture::Arm64 => 1,
        external::Architecture::Ppc64el => 2,
        external::Architecture::S390x => 3,
        external::Architecture::Riscv64 => 4,
        external::Architecture::Unknown => -1,
    }
}

pub fn architecture_from_code(
    code: i32,
) -> Result<external::Architecture, String> {
    match code {
        0 => Ok(external::Architecture::Amd64),
        1 => Ok(external::Architecture::Arm64),
        2 => Ok(external::Architecture::Ppc64el),
        3 => Ok(external::Architecture::S390x),
        4 => Ok(external::Architecture::Riscv64),
        -1 => Ok(external::Architecture::Unknown),
        other => Err(format!("unrecognized architecture code: {}", other)),
    }
}

/// The shared network identity for one machine and all of its link-layer
/// devices and addresses. Created atomically with its machine; never
/// shared.
#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = net_node)]
pub struct NetNode {
    pub uuid: SqlUuid,
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine)]
pub struct Machine {
    pub uuid: SqlUuid,
    pub name: Name,
    pub net_node_uuid: SqlUuid,
    pub life: DbLife,
    pub nonce: Option<String>,
    pub constraint_uuid: Option<SqlUuid>,
}

impl Machine {
    pub fn new(
        uuid: SqlUuid,
        name: external::MachineName,
        net_node_uuid: SqlUuid,
        nonce: Option<String>,
        constraint_uuid: Option<SqlUuid>,
    ) -> Self {
        Self {
            uuid,
            name: Name(name),
            net_node_uuid,
            life: DbLife::Alive,
            nonce,
            constraint_uuid,
        }
    }
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine_platform)]
pub struct MachinePlatform {
    pub machine_uuid: SqlUuid,
    pub os_type: DbOsType,
    pub channel: Option<String>,
    pub architecture: i32,
}

impl MachinePlatform {
    pub fn new(machine_uuid: SqlUuid, platform: &external::Platform) -> Self {
        Self {
            machine_uuid,
            os_type: platform.os_type.into(),
            channel: platform.channel.clone(),
            architecture: to_db_architecture(platform.architecture),
        }
    }
}

/// Placeholder for the cloud instance backing a machine. Created with the
/// machine; the instance id is filled in by the provisioning layer later.
#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine_cloud_instance)]
pub struct MachineCloudInstance {
    pub machine_uuid: SqlUuid,
    pub life: DbLife,
    pub instance_id: Option<String>,
}

impl MachineCloudInstance {
    pub fn new(machine_uuid: SqlUuid) -> Self {
        Self { machine_uuid, life: DbLife::Alive, instance_id: None }
    }
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine_status)]
pub struct MachineStatus {
    pub machine_uuid: SqlUuid,
    pub status: DbMachineStatus,
    pub updated_at: DateTime<Utc>,
}

impl MachineStatus {
    pub fn pending(machine_uuid: SqlUuid, now: DateTime<Utc>) -> Self {
        Self { machine_uuid, status: DbMachineStatus::Pending, updated_at: now }
    }
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine_cloud_instance_status)]
pub struct MachineCloudInstanceStatus {
    pub machine_uuid: SqlUuid,
    pub status: DbMachineStatus,
    pub updated_at: DateTime<Utc>,
}

impl MachineCloudInstanceStatus {
    pub fn pending(machine_uuid: SqlUuid, now: DateTime<Utc>) -> Self {
        Self { machine_uuid, status: DbMachineStatus::Pending, updated_at: now }
    }
}

/// Marks a container type a machine is capable of hosting.
#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine_container_type)]
pub struct MachineContainerType {
    pub machine_uuid: SqlUuid,
    pub container_type_id: i32,
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine_parent)]
pub struct MachineParent {
    pub machine_uuid: SqlUuid,
    pub parent_uuid: SqlUuid,
}

/// Scope value recording that a placement directive applies to the
/// machine itself rather than a container on it.
pub const MACHINE_PLACEMENT_SCOPE: i32 = 0;

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine_placement)]
pub struct MachinePlacement {
    pub machine_uuid: SqlUuid,
    pub scope: i32,
    pub directive: String,
}

impl MachinePlacement {
    pub fn machine_scoped(machine_uuid: SqlUuid, directive: String) -> Self {
        Self { machine_uuid, scope: MACHINE_PLACEMENT_SCOPE, directive }
    }
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = machine_requires_reboot)]
pub struct MachineRequiresReboot {
    pub machine_uuid: SqlUuid,
    pub created_at: DateTime<Utc>,
}
