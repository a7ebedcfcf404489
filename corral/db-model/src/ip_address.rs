// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::impl_enum_type;
use crate::schema::ip_address;
use crate::SqlUuid;
use corral_common::api::external;
use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, ToSql};
use diesel::sql_types;
use diesel::sqlite::Sqlite;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper storing an [`IpNetwork`] as CIDR-suffixed TEXT, e.g.
/// "10.0.0.5/24".
#[derive(
    Clone,
    Copy,
    Debug,
    AsExpression,
    FromSqlRow,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
)]
#[diesel(sql_type = sql_types::Text)]
#[serde(transparent)]
#[repr(transparent)]
pub struct DbIpNetwork(pub IpNetwork);

NewtypeFrom! { () pub struct DbIpNetwork(IpNetwork); }
NewtypeDeref! { () pub struct DbIpNetwork(IpNetwork); }

impl fmt::Display for DbIpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql<sql_types::Text, Sqlite> for DbIpNetwork {
    fn to_sql<'a>(
        &'a self,
        out: &mut serialize::Output<'a, '_, Sqlite>,
    ) -> serialize::Result {
        out.set_value(self.0.to_string());
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<sql_types::Text, Sqlite> for DbIpNetwork {
    fn from_sql(
        value: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<sql_types::Text, Sqlite>>::from_sql(value)?;
        Ok(DbIpNetwork(s.parse::<IpNetwork>()?))
    }
}

impl_enum_type!(
    #[derive(
        Clone,
        Copy,
        Debug,
        AsExpression,
        FromSqlRow,
        Eq,
        PartialEq,
        Serialize,
        Deserialize
    )]
    pub enum DbAddressType;

    V4 => 0
    V6 => 1
);

impl From<IpNetwork> for DbAddressType {
    fn from(addr: IpNetwork) -> Self {
        match addr {
            IpNetwork::V4(_) => DbAddressType::V4,
            IpNetwork::V6(_) => DbAddressType::V6,
        }
    }
}

// Config type ids follow the lookup table the original schema seeds,
// which has gaps.
impl_enum_type!(
    #[derive(
        Clone,
        Copy,
        Debug,
        AsExpression,
        FromSqlRow,
        Eq,
        PartialEq,
        Serialize,
        Deserialize
    )]
    pub enum DbConfigType;

    Unknown => 0
    Dhcp => 1
    Static => 4
    Manual => 5
    Loopback => 7
);

impl From<external::AddressConfigType> for DbConfigType {
    fn from(t: external::AddressConfigType) -> Self {
        match t {
            external::AddressConfigType::Unknown => DbConfigType::Unknown,
            external::AddressConfigType::Dhcp => DbConfigType::Dhcp,
            external::AddressConfigType::Static => DbConfigType::Static,
            external::AddressConfigType::Manual => DbConfigType::Manual,
            external::AddressConfigType::Loopback => DbConfigType::Loopback,
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
        Eq,
        PartialEq,
        Serialize,
        Deserialize
    )]
    pub enum DbAddressOrigin;

    Machine => 0
    Provider => 1
);

impl From<external::AddressOrigin> for DbAddressOrigin {
    fn from(o: external::AddressOrigin) -> Self {
        match o {
            external::AddressOrigin::Machine => DbAddressOrigin::Machine,
            external::AddressOrigin::Provider => DbAddressOrigin::Provider,
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
        Eq,
        PartialEq,
        Serialize,
        Deserialize
    )]
    pub enum DbAddressScope;

    Unknown => 0
    Public => 1
    CloudLocal => 2
    MachineLocal => 3
    LinkLocal => 4
);

impl From<external::AddressScope> for DbAddressScope {
    fn from(s: external::AddressScope) -> Self {
        match s {
            external::AddressScope::Unknown => DbAddressScope::Unknown,
            external::AddressScope::Public => DbAddressScope::Public,
            external::AddressScope::CloudLocal => DbAddressScope::CloudLocal,
            external::AddressScope::MachineLocal => {
                DbAddressScope::MachineLocal
            }
            external::AddressScope::LinkLocal => DbAddressScope::LinkLocal,
        }
    }
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = ip_address)]
pub struct IpAddress {
    pub uuid: SqlUuid,
    pub net_node_uuid: SqlUuid,
    pub device_uuid: SqlUuid,
    pub address: DbIpNetwork,
    pub address_type_id: DbAddressType,
    pub config_type_id: DbConfigType,
    pub origin_id: DbAddressOrigin,
    pub scope_id: DbAddressScope,
    pub is_secondary: bool,
    pub is_shadow: bool,
}
