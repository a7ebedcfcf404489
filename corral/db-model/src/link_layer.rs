// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::impl_enum_type;
use crate::schema::{
    link_layer_device, link_layer_device_parent, provider_link_layer_device,
};
use crate::MacAddr;
use crate::SqlUuid;
use corral_common::api::external;
use serde::{Deserialize, Serialize};

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
    pub enum DbDeviceType;

    Unknown => 0
    Loopback => 1
    Ethernet => 2
    Vlan8021Q => 3
    Bond => 4
    Bridge => 5
    Vxlan => 6
);

impl From<external::DeviceType> for DbDeviceType {
    fn from(t: external::DeviceType) -> Self {
        match t {
            external::DeviceType::Unknown => DbDeviceType::Unknown,
            external::DeviceType::Loopback => DbDeviceType::Loopback,
            external::DeviceType::Ethernet => DbDeviceType::Ethernet,
            external::DeviceType::Vlan8021Q => DbDeviceType::Vlan8021Q,
            external::DeviceType::Bond => DbDeviceType::Bond,
            external::DeviceType::Bridge => DbDeviceType::Bridge,
            external::DeviceType::Vxlan => DbDeviceType::Vxlan,
        }
    }
}

impl From<DbDeviceType> for external::DeviceType {
    fn from(t: DbDeviceType) -> Self {
        match t {
            DbDeviceType::Unknown => external::DeviceType::Unknown,
            DbDeviceType::Loopback => external::DeviceType::Loopback,
            DbDeviceType::Ethernet => external::DeviceType::Ethernet,
            DbDeviceType::Vlan8021Q => external::DeviceType::Vlan8021Q,
            DbDeviceType::Bond => external::DeviceType::Bond,
            DbDeviceType::Bridge => external::DeviceType::Bridge,
            DbDeviceType::Vxlan => external::DeviceType::Vxlan,
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
    pub enum DbVirtualPortType;

    NonVirtual => 0
    OpenVswitch => 1
);

impl From<external::VirtualPortType> for DbVirtualPortType {
    fn from(t: external::VirtualPortType) -> Self {
        match t {
            external::VirtualPortType::NonVirtual => {
                DbVirtualPortType::NonVirtual
            }
            external::VirtualPortType::OpenVswitch => {
                DbVirtualPortType::OpenVswitch
            }
        }
    }
}

impl From<DbVirtualPortType> for external::VirtualPortType {
    fn from(t: DbVirtualPortType) -> Self {
        match t {
            DbVirtualPortType::NonVirtual => {
                external::VirtualPortType::NonVirtual
            }
            DbVirtualPortType::OpenVswitch => {
                external::VirtualPortType::OpenVswitch
            }
        }
    }
}

/// A network interface record attached to a net node. Names are unique
/// within a net node; parent edges only link devices sharing one.
#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = link_layer_device)]
pub struct LinkLayerDevice {
    pub uuid: SqlUuid,
    pub net_node_uuid: SqlUuid,
    pub name: String,
    pub mtu: Option<i64>,
    pub mac_address: Option<MacAddr>,
    pub device_type_id: DbDeviceType,
    pub virtual_port_type_id: DbVirtualPortType,
    pub is_auto_start: bool,
    pub is_enabled: bool,
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = link_layer_device_parent)]
pub struct LinkLayerDeviceParent {
    pub device_uuid: SqlUuid,
    pub parent_uuid: SqlUuid,
}

#[derive(Queryable, Insertable, Selectable, Clone, Debug)]
#[diesel(table_name = provider_link_layer_device)]
pub struct ProviderLinkLayerDevice {
    pub provider_id: String,
    pub device_uuid: SqlUuid,
}
