// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods for bulk link-layer device import.
//!
//! The importer replaces the stored picture of every machine's network
//! interfaces wholesale: callers delete what a previous import wrote,
//! then insert the freshly observed devices in one transaction. Device
//! names are only unique per machine, so parent references resolve
//! through (machine, name) pairs, never bare names.

use super::DataStore;
use crate::context::OpContext;
use crate::db;
use crate::db::error::public_error_from_diesel;
use crate::db::error::ErrorHandler;
use crate::db::error::TransactionError;
use async_bb8_diesel::AsyncConnection;
use async_bb8_diesel::AsyncRunQueryDsl;
use corral_common::api::external;
use corral_common::api::external::DeleteResult;
use corral_common::api::external::Error;
use corral_common::api::external::LookupResult;
use corral_common::api::external::MachineName;
use corral_db_model::LinkLayerDevice;
use corral_db_model::LinkLayerDeviceParent;
use corral_db_model::MacAddr;
use corral_db_model::Name;
use corral_db_model::ProviderLinkLayerDevice;
use corral_db_model::SqlUuid;
use diesel::prelude::*;
use std::collections::BTreeMap;
use uuid::Uuid;

type TxnError = TransactionError<Error>;

impl DataStore {
    /// Inserts one observed batch of devices, which may span machines.
    ///
    /// Parent references must name a device in the same batch on the
    /// same machine; a dangling reference means the caller assembled the
    /// batch wrong and fails the whole import as an internal error.
    pub async fn import_link_layer_devices(
        &self,
        opctx: &OpContext,
        devices: Vec<external::ImportLinkLayerDevice>,
    ) -> Result<(), Error> {
        let count = devices.len();
        let conn = self.pool_connection().await?;
        conn.transaction_async(|conn| async move {
            // (machine, name) -> uuid for every device in the batch,
            // built up front so parent edges can resolve in one pass.
            let uuid_by_name: BTreeMap<(&MachineName, &str), SqlUuid> =
                devices
                    .iter()
                    .map(|d| {
                        ((&d.machine_id, d.name.as_str()), SqlUuid::from(d.uuid))
                    })
                    .collect();

            for d in &devices {
                use db::schema::link_layer_device::dsl;
                diesel::insert_into(dsl::link_layer_device)
                    .values(LinkLayerDevice {
                        uuid: SqlUuid::from(d.uuid),
                        net_node_uuid: SqlUuid::from(d.net_node_uuid),
                        name: d.name.clone(),
                        mtu: d.mtu,
                        mac_address: d.mac_address.map(MacAddr::from),
                        device_type_id: d.device_type.into(),
                        virtual_port_type_id: d.virtual_port_type.into(),
                        is_auto_start: d.is_auto_start,
                        is_enabled: d.is_enabled,
                    })
                    .execute_async(&conn)
                    .await?;
            }

            for d in &devices {
                let Some(provider_id) = &d.provider_id else { continue };
                use db::schema::provider_link_layer_device::dsl;
                diesel::insert_into(dsl::provider_link_layer_device)
                    .values(ProviderLinkLayerDevice {
                        provider_id: provider_id.clone(),
                        device_uuid: SqlUuid::from(d.uuid),
                    })
                    .execute_async(&conn)
                    .await?;
            }

            for d in &devices {
                let Some(parent_name) = &d.parent_device_name else {
                    continue;
                };
                let parent_uuid = uuid_by_name
                    .get(&(&d.machine_id, parent_name.as_str()))
                    .ok_or_else(|| {
                        TxnError::CustomError(Error::internal_error(&format!(
                            "device {:?} on machine {} names parent {:?}, \
                             which is not in the import batch",
                            d.name, d.machine_id, parent_name,
                        )))
                    })?;
                use db::schema::link_layer_device_parent::dsl;
                diesel::insert_into(dsl::link_layer_device_parent)
                    .values(LinkLayerDeviceParent {
                        device_uuid: SqlUuid::from(d.uuid),
                        parent_uuid: *parent_uuid,
                    })
                    .execute_async(&conn)
                    .await?;
            }

            Ok(())
        })
        .await
        .map_err(|e: TxnError| e.into_public(ErrorHandler::Server))?;

        info!(opctx.log, "imported link layer devices"; "count" => count);
        Ok(())
    }

    /// Removes everything a previous import wrote, children of the
    /// device table first.
    pub async fn delete_imported_link_layer_devices(
        &self,
        opctx: &OpContext,
    ) -> DeleteResult {
        let conn = self.pool_connection().await?;
        conn.transaction_async(|conn| async move {
            {
                use db::schema::provider_link_layer_device::dsl;
                diesel::delete(dsl::provider_link_layer_device)
                    .execute_async(&conn)
                    .await?;
            }
            {
                use db::schema::link_layer_device_parent::dsl;
                diesel::delete(dsl::link_layer_device_parent)
                    .execute_async(&conn)
                    .await?;
            }
            use db::schema::link_layer_device::dsl;
            diesel::delete(dsl::link_layer_device).execute_async(&conn).await?;
            Ok(())
        })
        .await
        .map_err(|e: TxnError| e.into_public(ErrorHandler::Server))?;

        info!(opctx.log, "deleted imported link layer devices");
        Ok(())
    }

    /// Every machine name with its net node, for callers assembling an
    /// import batch from per-machine observations.
    pub async fn all_machines_and_net_nodes(
        &self,
        _opctx: &OpContext,
    ) -> LookupResult<BTreeMap<MachineName, Uuid>> {
        use db::schema::machine::dsl;
        let rows = dsl::machine
            .select((dsl::name, dsl::net_node_uuid))
            .load_async::<(Name, SqlUuid)>(&*self.pool_connection().await?)
            .await
            .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))?;
        Ok(rows.into_iter().map(|(name, uuid)| (name.0, *uuid)).collect())
    }
}
