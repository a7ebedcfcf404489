// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::schema::{space, subnet, subnet_availability_zone};
use crate::DbIpNetwork;
use crate::SqlUuid;
use serde::{Deserialize, Serialize};

/// A named grouping of subnets.
#[derive(
    Queryable, Insertable, Selectable, Clone, Debug, Serialize, Deserialize,
)]
#[diesel(table_name = space)]
pub struct Space {
    pub uuid: SqlUuid,
    pub name: String,
}

#[derive(
    Queryable, Insertable, Selectable, Clone, Debug, Serialize, Deserialize,
)]
#[diesel(table_name = subnet)]
pub struct Subnet {
    pub uuid: SqlUuid,
    pub cidr: DbIpNetwork,
    pub space_uuid: SqlUuid,
    pub provider_id: Option<String>,
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = subnet_availability_zone)]
pub struct SubnetAvailabilityZone {
    pub subnet_uuid: SqlUuid,
    pub name: String,
}
