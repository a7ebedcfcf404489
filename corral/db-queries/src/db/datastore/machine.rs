// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`DataStore`] methods for machine placement.
//!
//! A machine and its net node are only ever created together, through
//! [`insert_machine_and_net_node_on_conn`]; there is no way to end up
//! with one and not the other. Sequence values for names are allocated
//! (and committed) before the placement transaction opens, so an aborted
//! placement burns its numbers.

use super::constraints::container_type_id_for;
use super::constraints::insert_constraints_on_conn;
use super::DataStore;
use crate::context::OpContext;
use crate::db;
use crate::db::error::public_error_from_diesel;
use crate::db::error::ErrorHandler;
use crate::db::error::TransactionError;
use crate::db::pool::DbConnection;
use async_bb8_diesel::AsyncConnection;
use async_bb8_diesel::AsyncRunQueryDsl;
use chrono::Utc;
use corral_common::api::external;
use corral_common::api::external::CreateResult;
use corral_common::api::external::DeleteResult;
use corral_common::api::external::Error;
use corral_common::api::external::ListResultVec;
use corral_common::api::external::LookupResult;
use corral_common::api::external::LookupType;
use corral_common::api::external::MachineName;
use corral_common::api::external::RebootAction;
use corral_common::api::external::ResourceType;
use corral_db_model::container_sequence_namespace;
use corral_db_model::DbLife;
use corral_db_model::Machine;
use corral_db_model::MachineCloudInstance;
use corral_db_model::MachineCloudInstanceStatus;
use corral_db_model::MachineContainerType;
use corral_db_model::MachineParent;
use corral_db_model::MachinePlacement;
use corral_db_model::MachinePlatform;
use corral_db_model::MachineRequiresReboot;
use corral_db_model::MachineStatus;
use corral_db_model::Name;
use corral_db_model::NetNode;
use corral_db_model::SqlUuid;
use corral_db_model::MACHINE_SEQUENCE_NAMESPACE;
use diesel::prelude::*;
use uuid::Uuid;

type TxnError = TransactionError<Error>;

/// Inserts a machine with its net node and every sibling row created at
/// machine birth: platform, constraints, cloud-instance placeholder, the
/// LXD container-type marker, and the two Pending status rows.
///
/// Runs on the caller's connection, inside the caller's transaction; any
/// failure rolls back the whole unit.
pub(crate) async fn insert_machine_and_net_node_on_conn(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    machine_uuid: SqlUuid,
    name: &MachineName,
    platform: &external::Platform,
    nonce: Option<String>,
    constraints: &external::Constraints,
) -> Result<SqlUuid, TxnError> {
    let now = Utc::now();

    let net_node_uuid = SqlUuid::new_v4();
    {
        use db::schema::net_node::dsl;
        diesel::insert_into(dsl::net_node)
            .values(NetNode { uuid: net_node_uuid })
            .execute_async(conn)
            .await?;
    }

    let constraint_uuid = SqlUuid::new_v4();
    insert_constraints_on_conn(conn, constraint_uuid, constraints).await?;

    {
        use db::schema::machine::dsl;
        diesel::insert_into(dsl::machine)
            .values(Machine::new(
                machine_uuid,
                name.clone(),
                net_node_uuid,
                nonce,
                Some(constraint_uuid),
            ))
            .execute_async(conn)
            .await?;
    }
    {
        use db::schema::machine_platform::dsl;
        diesel::insert_into(dsl::machine_platform)
            .values(MachinePlatform::new(machine_uuid, platform))
            .execute_async(conn)
            .await?;
    }
    {
        use db::schema::machine_cloud_instance::dsl;
        diesel::insert_into(dsl::machine_cloud_instance)
            .values(MachineCloudInstance::new(machine_uuid))
            .execute_async(conn)
            .await?;
    }

    // Every machine can host LXD containers.
    let lxd_id =
        container_type_id_for(conn, external::ContainerType::Lxd).await?;
    {
        use db::schema::machine_container_type::dsl;
        diesel::insert_into(dsl::machine_container_type)
            .values(MachineContainerType {
                machine_uuid,
                container_type_id: lxd_id,
            })
            .execute_async(conn)
            .await?;
    }

    {
        use db::schema::machine_status::dsl;
        diesel::insert_into(dsl::machine_status)
            .values(MachineStatus::pending(machine_uuid, now))
            .execute_async(conn)
            .await?;
    }
    {
        use db::schema::machine_cloud_instance_status::dsl;
        diesel::insert_into(dsl::machine_cloud_instance_status)
            .values(MachineCloudInstanceStatus::pending(machine_uuid, now))
            .execute_async(conn)
            .await?;
    }

    Ok(net_node_uuid)
}

impl DataStore {
    /// Creates one fresh top-level machine with the next available name.
    /// Returns the new machine's net node and name.
    pub async fn create_machine(
        &self,
        opctx: &OpContext,
        machine_uuid: Uuid,
        platform: &external::Platform,
        nonce: Option<String>,
        constraints: &external::Constraints,
    ) -> CreateResult<(Uuid, MachineName)> {
        let sequence = self
            .next_sequence_value(opctx, MACHINE_SEQUENCE_NAMESPACE)
            .await?;
        let name = MachineName::new(sequence);

        let conn = self.pool_connection().await?;
        let net_node_uuid = {
            let machine_name = name.clone();
            let platform = platform.clone();
            let constraints = constraints.clone();
            conn.transaction_async(|conn| async move {
                insert_machine_and_net_node_on_conn(
                    &conn,
                    SqlUuid::from(machine_uuid),
                    &machine_name,
                    &platform,
                    nonce,
                    &constraints,
                )
                .await
            })
            .await
            .map_err(|e: TxnError| {
                e.into_public(ErrorHandler::Conflict(
                    ResourceType::Machine,
                    name.as_str(),
                ))
            })?
        };

        info!(
            opctx.log,
            "created machine";
            "machine" => name.as_str(),
            "net_node" => %net_node_uuid,
        );
        Ok((*net_node_uuid, name))
    }

    /// Resolves a placement directive into machine rows.
    ///
    /// Returns the (child) machine's net node and the names involved:
    /// one name for `Unset`/`Machine`/`Provider`, `[parent, child]` for
    /// `Container`.
    pub async fn place_machine(
        &self,
        opctx: &OpContext,
        args: external::AddMachineArgs,
    ) -> CreateResult<(Uuid, Vec<MachineName>)> {
        let external::AddMachineArgs { platform, constraints, nonce, placement } =
            args;
        match placement {
            external::Placement::Unset => {
                let (net_node, name) = self
                    .create_machine(
                        opctx,
                        Uuid::new_v4(),
                        &platform,
                        nonce,
                        &constraints,
                    )
                    .await?;
                Ok((net_node, vec![name]))
            }
            external::Placement::Machine(name) => {
                self.existing_machine_net_node(&name).await
            }
            external::Placement::Container { container_type, parent } => {
                self.place_container(
                    opctx,
                    container_type,
                    parent,
                    &platform,
                    nonce,
                    &constraints,
                )
                .await
            }
            external::Placement::Provider(directive) => {
                self.place_provider_machine(
                    opctx,
                    directive,
                    &platform,
                    nonce,
                    &constraints,
                )
                .await
            }
        }
    }

    /// `Machine(name)` placement: attach to something already present.
    async fn existing_machine_net_node(
        &self,
        name: &MachineName,
    ) -> CreateResult<(Uuid, Vec<MachineName>)> {
        use db::schema::machine::dsl;
        let net_node_uuid = dsl::machine
            .filter(dsl::name.eq(Name(name.clone())))
            .select(dsl::net_node_uuid)
            .first_async::<SqlUuid>(&*self.pool_connection().await?)
            .await
            .map_err(|e| {
                public_error_from_diesel(
                    e,
                    ErrorHandler::NotFoundByLookup(
                        ResourceType::Machine,
                        LookupType::from(name),
                    ),
                )
            })?;
        Ok((*net_node_uuid, vec![name.clone()]))
    }

    async fn place_container(
        &self,
        opctx: &OpContext,
        container_type: external::ContainerType,
        parent: Option<MachineName>,
        platform: &external::Platform,
        nonce: Option<String>,
        constraints: &external::Constraints,
    ) -> CreateResult<(Uuid, Vec<MachineName>)> {
        // Containers only nest one level deep. Reject a container parent
        // before any sequence value is burned and before a doubly-nested
        // name could reach the machine table.
        if let Some(name) = &parent {
            if name.is_container() {
                return Err(Error::GrandParentNotSupported {
                    machine: name.to_string(),
                });
            }
        }

        // Name the parent before opening the transaction: either the
        // caller named one, or it takes the next top-level number.
        let (parent_name, parent_is_fresh) = match parent {
            Some(name) => (name, false),
            None => {
                let sequence = self
                    .next_sequence_value(opctx, MACHINE_SEQUENCE_NAMESPACE)
                    .await?;
                (MachineName::new(sequence), true)
            }
        };
        let child_sequence = self
            .next_sequence_value(
                opctx,
                &container_sequence_namespace(&parent_name, container_type),
            )
            .await?;
        let child_name = MachineName::container(
            &parent_name,
            container_type,
            child_sequence,
        );

        let conn = self.pool_connection().await?;
        let net_node_uuid = {
            let parent = parent_name.clone();
            let child = child_name.clone();
            let platform = platform.clone();
            let constraints = constraints.clone();
            conn.transaction_async(|conn| async move {
                let parent_uuid = if parent_is_fresh {
                    let parent_uuid = SqlUuid::new_v4();
                    insert_machine_and_net_node_on_conn(
                        &conn,
                        parent_uuid,
                        &parent,
                        &platform,
                        nonce.clone(),
                        &constraints,
                    )
                    .await?;
                    parent_uuid
                } else {
                    use db::schema::machine::dsl;
                    dsl::machine
                        .filter(dsl::name.eq(Name(parent.clone())))
                        .select(dsl::uuid)
                        .first_async::<SqlUuid>(&conn)
                        .await
                        .optional()?
                        .ok_or_else(|| {
                            TxnError::CustomError(Error::not_found_by_name(
                                ResourceType::Machine,
                                parent.as_str(),
                            ))
                        })?
                };

                let child_uuid = SqlUuid::new_v4();
                let net_node_uuid = insert_machine_and_net_node_on_conn(
                    &conn,
                    child_uuid,
                    &child,
                    &platform,
                    nonce,
                    &constraints,
                )
                .await?;

                use db::schema::machine_parent::dsl;
                diesel::insert_into(dsl::machine_parent)
                    .values(MachineParent {
                        machine_uuid: child_uuid,
                        parent_uuid,
                    })
                    .execute_async(&conn)
                    .await?;

                Ok(net_node_uuid)
            })
            .await
            .map_err(|e: TxnError| {
                e.into_public(ErrorHandler::Conflict(
                    ResourceType::Machine,
                    child_name.as_str(),
                ))
            })?
        };

        info!(
            opctx.log,
            "placed container";
            "parent" => parent_name.as_str(),
            "container" => child_name.as_str(),
        );
        Ok((*net_node_uuid, vec![parent_name, child_name]))
    }

    async fn place_provider_machine(
        &self,
        opctx: &OpContext,
        directive: String,
        platform: &external::Platform,
        nonce: Option<String>,
        constraints: &external::Constraints,
    ) -> CreateResult<(Uuid, Vec<MachineName>)> {
        let sequence = self
            .next_sequence_value(opctx, MACHINE_SEQUENCE_NAMESPACE)
            .await?;
        let name = MachineName::new(sequence);

        let conn = self.pool_connection().await?;
        let machine_uuid = SqlUuid::new_v4();
        let net_node_uuid = {
            let machine_name = name.clone();
            let platform = platform.clone();
            let constraints = constraints.clone();
            conn.transaction_async(|conn| async move {
                let net_node_uuid = insert_machine_and_net_node_on_conn(
                    &conn,
                    machine_uuid,
                    &machine_name,
                    &platform,
                    nonce,
                    &constraints,
                )
                .await?;

                // Recorded for the provisioning layer to consume later.
                use db::schema::machine_placement::dsl;
                diesel::insert_into(dsl::machine_placement)
                    .values(MachinePlacement::machine_scoped(
                        machine_uuid,
                        directive,
                    ))
                    .execute_async(&conn)
                    .await?;

                Ok(net_node_uuid)
            })
            .await
            .map_err(|e: TxnError| {
                e.into_public(ErrorHandler::Conflict(
                    ResourceType::Machine,
                    name.as_str(),
                ))
            })?
        };

        info!(
            opctx.log,
            "created provider-placed machine";
            "machine" => name.as_str(),
        );
        Ok((*net_node_uuid, vec![name]))
    }

    /// The provider directive recorded for a machine at placement time,
    /// if any.
    pub async fn machine_placement_directive(
        &self,
        _opctx: &OpContext,
        machine: &MachineName,
    ) -> LookupResult<Option<String>> {
        let conn = self.pool_connection().await?;
        let machine_uuid = machine_uuid_on_conn(&conn, machine).await?;

        use db::schema::machine_placement::dsl;
        dsl::machine_placement
            .filter(dsl::machine_uuid.eq(machine_uuid))
            .select(dsl::directive)
            .first_async::<String>(&*conn)
            .await
            .optional()
            .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))
    }

    pub async fn machine_life(
        &self,
        _opctx: &OpContext,
        machine: &MachineName,
    ) -> LookupResult<external::Life> {
        use db::schema::machine::dsl;
        let life = dsl::machine
            .filter(dsl::name.eq(Name(machine.clone())))
            .select(dsl::life)
            .first_async::<DbLife>(&*self.pool_connection().await?)
            .await
            .map_err(|e| {
                public_error_from_diesel(
                    e,
                    ErrorHandler::NotFoundByLookup(
                        ResourceType::Machine,
                        LookupType::from(machine),
                    ),
                )
            })?;
        Ok(life.into())
    }

    pub async fn all_machine_names(
        &self,
        _opctx: &OpContext,
    ) -> ListResultVec<MachineName> {
        use db::schema::machine::dsl;
        let names = dsl::machine
            .select(dsl::name)
            .order_by(dsl::name.asc())
            .load_async::<Name>(&*self.pool_connection().await?)
            .await
            .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))?;
        Ok(names.into_iter().map(|name| name.0).collect())
    }

    /// The UUID of the machine's parent, if it has one.
    pub async fn machine_parent_uuid(
        &self,
        _opctx: &OpContext,
        machine_uuid: Uuid,
    ) -> LookupResult<Option<Uuid>> {
        let conn = self.pool_connection().await?;
        Ok(parent_uuid_on_conn(&conn, SqlUuid::from(machine_uuid))
            .await?
            .map(|uuid| *uuid))
    }

    /// Marks a machine as requiring a reboot. Idempotent.
    pub async fn require_machine_reboot(
        &self,
        _opctx: &OpContext,
        machine_uuid: Uuid,
    ) -> Result<(), Error> {
        use db::schema::machine_requires_reboot::dsl;
        diesel::insert_into(dsl::machine_requires_reboot)
            .values(MachineRequiresReboot {
                machine_uuid: SqlUuid::from(machine_uuid),
                created_at: Utc::now(),
            })
            .on_conflict(dsl::machine_uuid)
            .do_nothing()
            .execute_async(&*self.pool_connection().await?)
            .await
            .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))?;
        Ok(())
    }

    /// Clears a machine's reboot flag. Idempotent.
    pub async fn clear_machine_reboot(
        &self,
        _opctx: &OpContext,
        machine_uuid: Uuid,
    ) -> DeleteResult {
        use db::schema::machine_requires_reboot::dsl;
        diesel::delete(dsl::machine_requires_reboot)
            .filter(dsl::machine_uuid.eq(SqlUuid::from(machine_uuid)))
            .execute_async(&*self.pool_connection().await?)
            .await
            .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))?;
        Ok(())
    }

    pub async fn is_machine_rebooting(
        &self,
        _opctx: &OpContext,
        machine_uuid: Uuid,
    ) -> LookupResult<bool> {
        let conn = self.pool_connection().await?;
        is_rebooting_on_conn(&conn, SqlUuid::from(machine_uuid)).await
    }

    /// Decides what a machine should do when asked to reboot, given its
    /// nesting: a container shuts down when its host machine is about to
    /// reboot, reboots when it is flagged itself, and otherwise does
    /// nothing.
    ///
    /// Nesting is exactly one level deep; finding a parent's parent is a
    /// hard error, never a computed action.
    pub async fn reboot_action(
        &self,
        _opctx: &OpContext,
        machine: &MachineName,
    ) -> LookupResult<RebootAction> {
        let conn = self.pool_connection().await?;
        let machine_uuid = machine_uuid_on_conn(&conn, machine).await?;

        let parent_uuid = parent_uuid_on_conn(&conn, machine_uuid).await?;
        if let Some(parent_uuid) = parent_uuid {
            if parent_uuid_on_conn(&conn, parent_uuid).await?.is_some() {
                return Err(Error::GrandParentNotSupported {
                    machine: machine.to_string(),
                });
            }
            if is_rebooting_on_conn(&conn, parent_uuid).await? {
                return Ok(RebootAction::ShouldShutdown);
            }
        }
        if is_rebooting_on_conn(&conn, machine_uuid).await? {
            return Ok(RebootAction::ShouldReboot);
        }
        Ok(RebootAction::ShouldDoNothing)
    }
}

pub(crate) async fn machine_uuid_on_conn(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    machine: &MachineName,
) -> LookupResult<SqlUuid> {
    use db::schema::machine::dsl;
    dsl::machine
        .filter(dsl::name.eq(Name(machine.clone())))
        .select(dsl::uuid)
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

async fn parent_uuid_on_conn(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    machine_uuid: SqlUuid,
) -> LookupResult<Option<SqlUuid>> {
    use db::schema::machine_parent::dsl;
    dsl::machine_parent
        .filter(dsl::machine_uuid.eq(machine_uuid))
        .select(dsl::parent_uuid)
        .first_async::<SqlUuid>(conn)
        .await
        .optional()
        .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))
}

async fn is_rebooting_on_conn(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    machine_uuid: SqlUuid,
) -> LookupResult<bool> {
    use db::schema::machine_requires_reboot::dsl;
    let flagged = dsl::machine_requires_reboot
        .filter(dsl::machine_uuid.eq(machine_uuid))
        .select(dsl::machine_uuid)
        .first_async::<SqlUuid>(conn)
        .await
        .optional()
        .map_err(|e| public_error_from_diesel(e, ErrorHandler::Server))?;
    Ok(flagged.is_some())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::datastore::pub_test_utils::datastore_test;
    use assert_matches::assert_matches;
    use corral_common::api::external::AddMachineArgs;
    use corral_common::api::external::Architecture;
    use corral_common::api::external::ContainerType;
    use corral_common::api::external::Life;
    use corral_common::api::external::OsType;
    use corral_common::api::external::Placement;
    use corral_common::api::external::Platform;
    use corral_common::api::external::SpaceConstraint;

    fn args(placement: Placement) -> AddMachineArgs {
        AddMachineArgs {
            platform: Platform {
                os_type: OsType::Ubuntu,
                channel: Some("22.04/stable".to_string()),
                architecture: Architecture::Amd64,
            },
            constraints: Default::default(),
            nonce: Some("fake-nonce".to_string()),
            placement,
        }
    }

    #[tokio::test]
    async fn test_unset_placement_yields_sequential_names() {
        let db = datastore_test("unset_placement_yields_sequential_names")
            .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (net_node_0, names_0) = datastore
            .place_machine(opctx, args(Placement::Unset))
            .await
            .unwrap();
        let (net_node_1, names_1) = datastore
            .place_machine(opctx, args(Placement::Unset))
            .await
            .unwrap();

        assert_eq!(names_0, vec!["0".parse().unwrap()]);
        assert_eq!(names_1, vec!["1".parse().unwrap()]);
        assert_ne!(net_node_0, net_node_1);
        assert_eq!(
            datastore.machine_life(opctx, &names_0[0]).await.unwrap(),
            Life::Alive
        );
    }

    #[tokio::test]
    async fn test_machine_placement_attaches_to_existing() {
        let db = datastore_test("machine_placement_attaches_to_existing")
            .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (net_node, names) = datastore
            .place_machine(opctx, args(Placement::Unset))
            .await
            .unwrap();
        let (found_net_node, found_names) = datastore
            .place_machine(
                opctx,
                args(Placement::Machine(names[0].clone())),
            )
            .await
            .unwrap();
        assert_eq!(found_net_node, net_node);
        assert_eq!(found_names, names);

        // Attaching never creates rows.
        assert_eq!(
            datastore.all_machine_names(opctx).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_machine_placement_missing_machine_fails() {
        let db = datastore_test("machine_placement_missing_machine_fails")
            .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let err = datastore
            .place_machine(
                opctx,
                args(Placement::Machine("7".parse().unwrap())),
            )
            .await
            .unwrap_err();
        assert_matches!(
            err,
            Error::ObjectNotFound { type_name: ResourceType::Machine, .. }
        );
    }

    #[tokio::test]
    async fn test_container_placement_names_parent_then_child() {
        let db =
            datastore_test("container_placement_names_parent_then_child")
                .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (_, names) = datastore
            .place_machine(opctx, args(Placement::Unset))
            .await
            .unwrap();
        let parent = names[0].clone();

        let container = |parent: &MachineName| {
            args(Placement::Container {
                container_type: ContainerType::Lxd,
                parent: Some(parent.clone()),
            })
        };
        let (_, first) = datastore
            .place_machine(opctx, container(&parent))
            .await
            .unwrap();
        let (_, second) = datastore
            .place_machine(opctx, container(&parent))
            .await
            .unwrap();

        assert_eq!(first, vec![parent.clone(), "0/lxd/0".parse().unwrap()]);
        assert_eq!(second, vec![parent.clone(), "0/lxd/1".parse().unwrap()]);

        // The child is linked to its parent.
        let conn = datastore.pool_connection().await.unwrap();
        let child_uuid =
            machine_uuid_on_conn(&conn, &second[1]).await.unwrap();
        let parent_uuid = machine_uuid_on_conn(&conn, &parent).await.unwrap();
        drop(conn);
        assert_eq!(
            datastore
                .machine_parent_uuid(opctx, *child_uuid)
                .await
                .unwrap(),
            Some(*parent_uuid)
        );
    }

    #[tokio::test]
    async fn test_container_placement_creates_parent_when_none_named() {
        let db = datastore_test(
            "container_placement_creates_parent_when_none_named",
        )
        .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (_, names) = datastore
            .place_machine(
                opctx,
                args(Placement::Container {
                    container_type: ContainerType::Lxd,
                    parent: None,
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            names,
            vec!["0".parse().unwrap(), "0/lxd/0".parse().unwrap()]
        );
        // The fresh parent is a full machine in its own right.
        assert_eq!(
            datastore.machine_life(opctx, &names[0]).await.unwrap(),
            Life::Alive
        );
    }

    #[tokio::test]
    async fn test_container_placement_missing_parent_fails() {
        let db = datastore_test("container_placement_missing_parent_fails")
            .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let err = datastore
            .place_machine(
                opctx,
                args(Placement::Container {
                    container_type: ContainerType::Lxd,
                    parent: Some("3".parse().unwrap()),
                }),
            )
            .await
            .unwrap_err();
        assert_matches!(
            err,
            Error::ObjectNotFound { type_name: ResourceType::Machine, .. }
        );
        assert!(datastore.all_machine_names(opctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_container_placement_rejects_container_parent() {
        let db = datastore_test("container_placement_rejects_container_parent")
            .await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (_, names) = datastore
            .place_machine(
                opctx,
                args(Placement::Container {
                    container_type: ContainerType::Lxd,
                    parent: None,
                }),
            )
            .await
            .unwrap();
        let container = names[1].clone();
        assert!(container.is_container());

        let err = datastore
            .place_machine(
                opctx,
                args(Placement::Container {
                    container_type: ContainerType::Lxd,
                    parent: Some(container.clone()),
                }),
            )
            .await
            .unwrap_err();
        assert_matches!(err, Error::GrandParentNotSupported { ref machine }
            if machine == container.as_str());

        // The rejection happens before any row is written; every stored
        // name still decodes.
        let all = datastore.all_machine_names(opctx).await.unwrap();
        assert_eq!(all, vec![names[0].clone(), container]);
    }

    #[tokio::test]
    async fn test_provider_placement_records_directive() {
        let db = datastore_test("provider_placement_records_directive").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (_, names) = datastore
            .place_machine(
                opctx,
                args(Placement::Provider("zone=us-east-1a".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(names, vec!["0".parse().unwrap()]);
        assert_eq!(
            datastore
                .machine_placement_directive(opctx, &names[0])
                .await
                .unwrap(),
            Some("zone=us-east-1a".to_string())
        );

        // Unset placement writes no directive row.
        let (_, names) = datastore
            .place_machine(opctx, args(Placement::Unset))
            .await
            .unwrap();
        assert_eq!(
            datastore
                .machine_placement_directive(opctx, &names[0])
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_failed_placement_burns_sequence_value() {
        let db = datastore_test("failed_placement_burns_sequence_value").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let mut bad = args(Placement::Unset);
        bad.constraints.spaces = Some(vec![SpaceConstraint {
            space: "missing".to_string(),
            exclude: false,
        }]);
        datastore.place_machine(opctx, bad).await.unwrap_err();

        // The aborted placement consumed "0"; the next machine is "1".
        let (_, names) = datastore
            .place_machine(opctx, args(Placement::Unset))
            .await
            .unwrap();
        assert_eq!(names, vec!["1".parse().unwrap()]);
    }

    #[tokio::test]
    async fn test_reboot_flags_drive_reboot_action() {
        let db = datastore_test("reboot_flags_drive_reboot_action").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        let (_, names) = datastore
            .place_machine(
                opctx,
                args(Placement::Container {
                    container_type: ContainerType::Lxd,
                    parent: None,
                }),
            )
            .await
            .unwrap();
        let (parent, child) = (names[0].clone(), names[1].clone());

        let conn = datastore.pool_connection().await.unwrap();
        let parent_uuid = *machine_uuid_on_conn(&conn, &parent).await.unwrap();
        let child_uuid = *machine_uuid_on_conn(&conn, &child).await.unwrap();
        drop(conn);

        assert_eq!(
            datastore.reboot_action(opctx, &child).await.unwrap(),
            RebootAction::ShouldDoNothing
        );

        datastore.require_machine_reboot(opctx, child_uuid).await.unwrap();
        assert!(datastore
            .is_machine_rebooting(opctx, child_uuid)
            .await
            .unwrap());
        assert_eq!(
            datastore.reboot_action(opctx, &child).await.unwrap(),
            RebootAction::ShouldReboot
        );

        // A host about to reboot shuts its containers down, and that
        // takes precedence over the container's own flag.
        datastore.require_machine_reboot(opctx, parent_uuid).await.unwrap();
        assert_eq!(
            datastore.reboot_action(opctx, &child).await.unwrap(),
            RebootAction::ShouldShutdown
        );
        assert_eq!(
            datastore.reboot_action(opctx, &parent).await.unwrap(),
            RebootAction::ShouldReboot
        );

        datastore.clear_machine_reboot(opctx, parent_uuid).await.unwrap();
        datastore.clear_machine_reboot(opctx, child_uuid).await.unwrap();
        assert_eq!(
            datastore.reboot_action(opctx, &child).await.unwrap(),
            RebootAction::ShouldDoNothing
        );
    }

    #[tokio::test]
    async fn test_grandparent_traversal_is_rejected() {
        let db = datastore_test("grandparent_traversal_is_rejected").await;
        let (opctx, datastore) = (db.opctx(), db.datastore());

        // Place a machine and a container on another machine, then link
        // the container's host under the first machine directly. The
        // datastore never creates such a chain itself; this simulates
        // data from a system that allowed deeper nesting.
        let (_, grandparent) = datastore
            .place_machine(opctx, args(Placement::Unset))
            .await
            .unwrap();
        let (_, names) = datastore
            .place_machine(
                opctx,
                args(Placement::Container {
                    container_type: ContainerType::Lxd,
                    parent: None,
                }),
            )
            .await
            .unwrap();
        let (parent, child) = (names[0].clone(), names[1].clone());

        let conn = datastore.pool_connection().await.unwrap();
        let grandparent_uuid =
            machine_uuid_on_conn(&conn, &grandparent[0]).await.unwrap();
        let parent_uuid = machine_uuid_on_conn(&conn, &parent).await.unwrap();
        {
            use db::schema::machine_parent::dsl;
            diesel::insert_into(dsl::machine_parent)
                .values(MachineParent {
                    machine_uuid: parent_uuid,
                    parent_uuid: grandparent_uuid,
                })
                .execute_async(&*conn)
                .await
                .unwrap();
        }
        drop(conn);

        let err = datastore.reboot_action(opctx, &child).await.unwrap_err();
        assert_matches!(err, Error::GrandParentNotSupported { ref machine }
            if machine == child.as_str());
    }
}
