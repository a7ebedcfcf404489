// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods for spaces, subnets, and device addresses.
//!
//! This is the read side the bridge policy engine consumes: it never
//! classifies addresses into spaces itself, it hands the policy the raw
//! host topology ([`machine_host_devices`]) and the space definitions
//! ([`space_infos`]) and lets the pure code decide.
//!
//! [`machine_host_devices`]: DataStore::machine_host_devices
//! [`space_infos`]: DataStore::space_infos

use super::DataStore;
use crate::context::OpContext;
use crate::db;
use crate::db::error::public_error_from_diesel;
use crate::db::error::ErrorHandler;
use crate::db::error::TransactionError;
use crate::db::pool::DbConnection;
use async_bb8_diesel::AsyncConnection;
use async_bb8_diesel::AsyncRunQueryDsl;
use corral_common::api::external;
use corral_common::api::external::CreateResult;
use corral_common::api::external::ListResultVec;
use corral_common::api::external::LookupResult;
use corral_common::api::external::LookupType;
use corral_common::api::external::MachineName;
use corral_common::api::external::ResourceType;
use corral_db_model::DbAddressOrigin;
use corral_db_model::DbAddressScope;
use corral_db_model::DbAddressType;
use corral_db_model::DbConfigType;
use corral_db_model::DbIpNetwork;
use corral_db_model::IpAddress;
use corral_db_model::LinkLayerDevice;
use corral_db_model::LinkLayerDeviceParent;
use corral_db_model::Name;
use corral_db_model::Space;
use corral_db_model::SqlUuid;
use corral_db_model::Subnet;
use corral_db_model::SubnetAvailabilityZone;
use corral_networking::HostDevice;
use corral_networking::SpaceInfo;
use diesel::prelude::*;
use ipnetwork::IpNetwork;
use std::collections::BTreeMap;
use uuid::Uuid;

type TxnError = TransactionError<external::Error>;

impl DataStore {
    pub async fn space_create(
        &self,
        opctx: &OpContext,
        name: &str,
    ) -> CreateResult<Uuid> {
        use db::schema::space::dsl;
        let uuid = SqlUuid::new_v4();
        diesel::insert_into(dsl::space)
            .values(Space { uuid, name: name.to_string() })
            .execute_async(&*self.pool_connection().await?)
            .await
            .map_err(|e| {
                public_error_from_diesel(
                    e,
                    ErrorHandler::Conflict(ResourceType::Space, name),
                )
            })?;

        info!(opctx.log, "created space"; "space" => name);
        Ok(*uuid)
    }

    pub async fn space_list(
        &self,
        _opctx: &OpContext,
    ) -> ListResultVec<Space> {
        use db::schema::space::dsl;
        dsl::space
            .order_by(dsl::name.asc())
            .load_async(&*self.pool_connection().await?)
            .await
            .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))
    }

    /// Creates a subnet in a space, with the availability zones it spans.
    pub async fn subnet_create(
        &self,
        opctx: &OpContext,
        space_uuid: Uuid,
        cidr: IpNetwork,
        provider_id: Option<String>,
        availability_zones: Vec<String>,
    ) -> CreateResult<Uuid> {
        let uuid = SqlUuid::new_v4();
        let conn = self.pool_connection().await?;
        conn.transaction_async(|conn| async move {
            {
                use db::schema::subnet::dsl;
                diesel::insert_into(dsl::subnet)
                    .values(Subnet {
                        uuid,
                        cidr: DbIpNetwork(cidr),
                        space_uuid: SqlUuid::from(space_uuid),
                        provider_id,
                    })
                    .execute_async(&conn)
                    .await?;
            }
            use db::schema::subnet_availability_zone::dsl;
            for name in availability_zones {
                diesel::insert_into(dsl::subnet_availability_zone)
                    .values(SubnetAvailabilityZone { subnet_uuid: uuid, name })
                    .execute_async(&conn)
                    .await?;
            }
            Ok(())
        })
        .await
        .map_err(|e: TxnError| {
            e.into_public(ErrorHandler::Conflict(
                ResourceType::Subnet,
                &cidr.to_string(),
            ))
        })?;

        info!(
            opctx.log,
            "created subnet";
            "cidr" => %cidr,
            "space" => %space_uuid,
        );
        Ok(*uuid)
    }

    pub async fn subnet_list(
        &self,
        _opctx: &OpContext,
    ) -> ListResultVec<Subnet> {
        use db::schema::subnet::dsl;
        dsl::subnet
            .order_by(dsl::cidr.asc())
            .load_async(&*self.pool_connection().await?)
            .await
            .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))
    }

    /// Every space with the subnets that define membership in it, in the
    /// shape the bridge policy takes as input.
    pub async fn space_infos(
        &self,
        opctx: &OpContext,
    ) -> ListResultVec<SpaceInfo> {
        let spaces = self.space_list(opctx).await?;
        let subnets = self.subnet_list(opctx).await?;

        let mut by_space: BTreeMap<SqlUuid, Vec<IpNetwork>> = BTreeMap::new();
        for subnet in subnets {
            by_space.entry(subnet.space_uuid).or_default().push(*subnet.cidr);
        }
        Ok(spaces
            .into_iter()
            .map(|space| SpaceInfo {
                name: space.name,
                subnets: by_space.remove(&space.uuid).unwrap_or_default(),
            })
            .collect())
    }

    /// Attaches an observed address to a named device on a machine.
    pub async fn add_ip_address(
        &self,
        opctx: &OpContext,
        machine: &MachineName,
        device_name: &str,
        address: IpNetwork,
        config_type: external::AddressConfigType,
        origin: external::AddressOrigin,
        scope: external::AddressScope,
    ) -> CreateResult<Uuid> {
        let conn = self.pool_connection().await?;
        let net_node_uuid = net_node_uuid_on_conn(&conn, machine).await?;
        let device_uuid =
            device_uuid_on_conn(&conn, net_node_uuid, device_name).await?;

        let uuid = SqlUuid::new_v4();
        {
            use db::schema::ip_address::dsl;
            diesel::insert_into(dsl::ip_address)
                .values(IpAddress {
                    uuid,
                    net_node_uuid,
                    device_uuid,
                    address: DbIpNetwork(address),
                    address_type_id: DbAddressType::from(address),
                    config_type_id: DbConfigType::from(config_type),
                    origin_id: DbAddressOrigin::from(origin),
                    scope_id: DbAddressScope::from(scope),
                    is_secondary: false,
                    is_shadow: false,
                })
                .execute_async(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(e, ErrorHandler::Server)
                })?;
        }

        debug!(
            opctx.log,
            "added ip address";
            "machine" => machine.as_str(),
            "device" => device_name,
            "address" => %address,
        );
        Ok(*uuid)
    }

    /// The machine's link-layer devices with their parent edges and
    /// addresses resolved, in the shape the bridge policy takes as
    /// input.
    pub async fn machine_host_devices(
        &self,
        _opctx: &OpContext,
        machine: &MachineName,
    ) -> LookupResult<Vec<HostDevice>> {
        let conn = self.pool_connection().await?;
        let net_node_uuid = net_node_uuid_on_conn(&conn, machine).await?;

        let devices: Vec<LinkLayerDevice> = {
            use db::schema::link_layer_device::dsl;
            dsl::link_layer_device
                .filter(dsl::net_node_uuid.eq(net_node_uuid))
                .order_by(dsl::name.asc())
                .load_async(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(e, ErrorHandler::Server)
                })?
        };

        // Parent edges only ever link devices on the same net node, so
        // the device list we just fetched covers every parent uuid.
        let parents: Vec<LinkLayerDeviceParent> = {
            use db::schema::link_layer_device_parent::dsl;
            dsl::link_layer_device_parent
                .filter(
                    dsl::device_uuid
                        .eq_any(devices.iter().map(|d| d.uuid)),
                )
                .load_async(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(e, ErrorHandler::Server)
                })?
        };
        let name_by_uuid: BTreeMap<SqlUuid, &str> = devices
            .iter()
            .map(|device| (device.uuid, device.name.as_str()))
            .collect();
        let parent_by_device: BTreeMap<SqlUuid, String> = parents
            .iter()
            .filter_map(|edge| {
                name_by_uuid
                    .get(&edge.parent_uuid)
                    .map(|name| (edge.device_uuid, name.to_string()))
            })
            .collect();

        let addresses: Vec<IpAddress> = {
            use db::schema::ip_address::dsl;
            dsl::ip_address
                .filter(dsl::net_node_uuid.eq(net_node_uuid))
                .load_async(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(e, ErrorHandler::Server)
                })?
        };
        let mut addresses_by_device: BTreeMap<SqlUuid, Vec<IpNetwork>> =
            BTreeMap::new();
        for row in addresses {
            addresses_by_device
                .entry(row.device_uuid)
                .or_default()
                .push(*row.address);
        }

        Ok(devices
            .into_iter()
            .map(|device| HostDevice {
                parent_name: parent_by_device.get(&device.uuid).cloned(),
                addresses: addresses_by_device
                    .remove(&device.uuid)
                    .unwrap_or_default(),
                name: device.name,
                device_type: device.device_type_id.into(),
                virtual_port_type: device.virtual_port_type_id.into(),
            })
            .collect())
    }
}

async fn net_node_uuid_on_conn(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    machine: &MachineName,
) -> LookupResult<SqlUuid> {
    use db::schema::machine::dsl;
    dsl::machine
        .filter(dsl::name.eq(Name(machine.clone())))
        .select(dsl::net_node_uuid)
        .first_async::<SqlUuid>(conn)
        .await
        .map_err(|e| {
            public_error_from_diesel(
                e,
                ErrorHandler::NotFoundByLookup(
                    ResourceType::Machine,
                    LookupType::from(machine),
                ),
            )
        })
}

async fn device_uuid_on_conn(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    net_node_uuid: SqlUuid,
    device_name: &str,
) -> LookupResult<SqlUuid> {
    use db::schema::link_layer_device::dsl;
    dsl::link_layer_device
        .filter(dsl::net_node_uuid.eq(net_node_uuid))
        .filter(dsl::name.eq(device_name.to_string()))
        .select(dsl::uuid)
        .first_async::<SqlUuid>(conn)
        .await
        .map_err(|e| {
            public_error_from_diesel(
                e,
                ErrorHandler::NotFoundByLookup(
                    ResourceType::LinkLayerDevice,
                    LookupType::from(device_name),
                ),
            )
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::datastore::pub_test_utils::datastore_test;
    use assert_matches::assert_matches;
    use corral_common::api::external::AddMachineArgs;
    use corral_common::api::external::AddressConfigType;
    use corral_common::api::external::AddressOrigin;
    use corral_common::api::external::AddressScope;
    use corral_common::api::external::Architecture;
    use corral_common::api::external::DeviceType;
    use corral_common::api::external::Error;
    use corral_common::api::external::ImportLinkLayerDevice;
    use corral_common::api::external::OsType;
    use corral_common::api::external::Placement;
    use corral_common::api::external::Platform;
    use corral_common::api::external::VirtualPortType;
    use corral_networking::BridgePolicy;
    use corral_networking::ContainerDevice;
    use corral_networking::ContainerNetworkingMethod;

    fn add_machine_args() -> AddMachineArgs {
        AddMachineArgs {
            platform: Platform {
                os_type: OsType::Ubuntu,
                channel: Some("22.04/stable".to_string()),
                architecture: Architecture::Amd64,
            },
            constraints: Default::default(),
            nonce: None,
            placement: Placement::Unset,
        }
    }

    fn device(
        net_node_uuid: Uuid,
        machine: &MachineName,
        name: &str,
        device_type: DeviceType,
        parent: Option<&str>,
    ) -> ImportLinkLayerDevice {
        ImportLinkLayerDevice {
            uuid: Uuid::new_v4(),
            net_node_uuid,
            machine_id: machine.clone(),
            name: name.to_string(),
            mtu: Some(1500),
            mac_address: None,
            device_type,
            virtual_port_type: VirtualPortType::NonVirtual,
            parent_device_name: parent.map(str::to_string),
            provider_id: None,
            is_auto_start: true,
            is_enabled: true,
        }
    }

    #[tokio::test]
    async fn test_space_and_subnet_round_trip() {
        let db = datastore_test("space_and_subnet_round_trip").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let alpha = datastore.space_create(opctx, "alpha").await.unwrap();
        let beta = datastore.space_create(opctx, "beta").await.unwrap();
        datastore
            .subnet_create(
                opctx,
                alpha,
                "10.0.0.0/24".parse().unwrap(),
                Some("subnet-0abc".to_string()),
                vec!["az1".to_string(), "az2".to_string()],
            )
            .await
            .unwrap();
        datastore
            .subnet_create(
                opctx,
                beta,
                "10.0.1.0/24".parse().unwrap(),
                None,
                Vec::new(),
            )
            .await
            .unwrap();

        let spaces = datastore.space_list(opctx).await.unwrap();
        assert_eq!(
            spaces.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["alpha", "beta"]
        );
        let subnets = datastore.subnet_list(opctx).await.unwrap();
        assert_eq!(subnets.len(), 2);
        assert_eq!(subnets[0].provider_id.as_deref(), Some("subnet-0abc"));

        let infos = datastore.space_infos(opctx).await.unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name, "alpha");
        assert_eq!(infos[0].subnets, vec!["10.0.0.0/24".parse().unwrap()]);
        assert_eq!(infos[1].subnets, vec!["10.0.1.0/24".parse().unwrap()]);
    }

    #[tokio::test]
    async fn test_duplicate_space_name_conflicts() {
        let db = datastore_test("duplicate_space_name_conflicts").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        datastore.space_create(opctx, "alpha").await.unwrap();
        let err = datastore.space_create(opctx, "alpha").await.unwrap_err();
        assert_matches!(
            err,
            Error::ObjectAlreadyExists { type_name: ResourceType::Space, .. }
        );
    }

    #[tokio::test]
    async fn test_host_devices_carry_parents_and_addresses() {
        let db = datastore_test("host_devices_carry_parents_and_addresses")
            .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (net_node, names) = datastore
            .place_machine(opctx, add_machine_args())
            .await
            .unwrap();
        let machine = names[0].clone();

        datastore
            .import_link_layer_devices(
                opctx,
                vec![
                    device(net_node, &machine, "eth0", DeviceType::Ethernet,
                        Some("br-eth0")),
                    device(net_node, &machine, "br-eth0", DeviceType::Bridge,
                        None),
                ],
            )
            .await
            .unwrap();
        datastore
            .add_ip_address(
                opctx,
                &machine,
                "br-eth0",
                "10.0.0.5/24".parse().unwrap(),
                AddressConfigType::Static,
                AddressOrigin::Machine,
                AddressScope::CloudLocal,
            )
            .await
            .unwrap();

        let devices =
            datastore.machine_host_devices(opctx, &machine).await.unwrap();
        assert_eq!(devices.len(), 2);

        // Ordered by name: "br-eth0" then "eth0".
        assert_eq!(devices[0].name, "br-eth0");
        assert_eq!(devices[0].device_type, DeviceType::Bridge);
        assert_eq!(devices[0].parent_name, None);
        assert_eq!(
            devices[0].addresses,
            vec!["10.0.0.5/24".parse::<IpNetwork>().unwrap()]
        );
        assert_eq!(devices[1].name, "eth0");
        assert_eq!(devices[1].parent_name.as_deref(), Some("br-eth0"));
        assert!(devices[1].addresses.is_empty());
    }

    #[tokio::test]
    async fn test_add_address_to_unknown_device_fails() {
        let db = datastore_test("add_address_to_unknown_device_fails").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (_, names) = datastore
            .place_machine(opctx, add_machine_args())
            .await
            .unwrap();
        let err = datastore
            .add_ip_address(
                opctx,
                &names[0],
                "eth9",
                "10.0.0.5/24".parse().unwrap(),
                AddressConfigType::Static,
                AddressOrigin::Machine,
                AddressScope::CloudLocal,
            )
            .await
            .unwrap_err();
        assert_matches!(
            err,
            Error::ObjectNotFound {
                type_name: ResourceType::LinkLayerDevice,
                ..
            }
        );
    }

    // The full read path: stored topology in, bridge choice out.
    #[tokio::test]
    async fn test_host_devices_feed_the_bridge_policy() {
        let db = datastore_test("host_devices_feed_the_bridge_policy").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let space = datastore.space_create(opctx, "db").await.unwrap();
        datastore
            .subnet_create(
                opctx,
                space,
                "10.0.0.0/24".parse().unwrap(),
                None,
                Vec::new(),
            )
            .await
            .unwrap();

        let (net_node, names) = datastore
            .place_machine(opctx, add_machine_args())
            .await
            .unwrap();
        let machine = names[0].clone();
        datastore
            .import_link_layer_devices(
                opctx,
                vec![
                    device(net_node, &machine, "eth0", DeviceType::Ethernet,
                        Some("br-eth0")),
                    device(net_node, &machine, "br-eth0", DeviceType::Bridge,
                        None),
                ],
            )
            .await
            .unwrap();
        datastore
            .add_ip_address(
                opctx,
                &machine,
                "br-eth0",
                "10.0.0.5/24".parse().unwrap(),
                AddressConfigType::Static,
                AddressOrigin::Provider,
                AddressScope::CloudLocal,
            )
            .await
            .unwrap();

        let host_devices =
            datastore.machine_host_devices(opctx, &machine).await.unwrap();
        let space_infos = datastore.space_infos(opctx).await.unwrap();

        let policy = BridgePolicy::new(
            ContainerNetworkingMethod::Provider,
            machine.as_str(),
            "0/lxd/0",
        );
        let container_devices = policy
            .populate_container_devices(
                &host_devices,
                &space_infos,
                &["db".to_string()],
            )
            .unwrap();
        assert_eq!(
            container_devices,
            vec![ContainerDevice {
                container_device_name: "eth0".to_string(),
                host_bridge_name: "br-eth0".to_string(),
            }]
        );
    }
}
