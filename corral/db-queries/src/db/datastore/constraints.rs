// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Encoding machine constraints to their normalized storage rows.

use super::DataStore;
use crate::context::OpContext;
use crate::db;
use crate::db::error::public_error_from_diesel;
use crate::db::error::ErrorHandler;
use crate::db::error::TransactionError;
use crate::db::pool::DbConnection;
use async_bb8_diesel::AsyncRunQueryDsl;
use corral_common::api::external;
use corral_common::api::external::Error;
use corral_common::api::external::LookupResult;
use corral_common::api::external::LookupType;
use corral_common::api::external::ResourceType;
use corral_db_model::architecture_from_code;
use corral_db_model::container_type_from_id;
use corral_db_model::to_db_architecture;
use corral_db_model::ConstraintSpace;
use corral_db_model::ConstraintTag;
use corral_db_model::ConstraintZone;
use corral_db_model::MachineConstraint;
use corral_db_model::Name;
use corral_db_model::SqlUuid;
use diesel::prelude::*;

type TxnError = TransactionError<Error>;

/// Writes the `machine_constraint` row and its tag/space/zone collection
/// rows on `conn`, inside the caller's transaction.
///
/// Space names and the container type are resolved against their tables
/// at write time; a miss fails the whole constraint write with
/// [`Error::InvalidConstraints`].
pub(crate) async fn insert_constraints_on_conn(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    constraint_uuid: SqlUuid,
    constraints: &external::Constraints,
) -> Result<(), TxnError> {
    let arch = match constraints.arch {
        None => None,
        Some(external::Architecture::Unknown) => {
            return Err(TxnError::CustomError(Error::invalid_constraints(
                "architecture constraint must name a specific architecture",
            )));
        }
        Some(arch) => Some(to_db_architecture(arch)),
    };

    let container_type_id = match constraints.container {
        None => None,
        Some(ct) => Some(container_type_id_for(conn, ct).await?),
    };

    let row = MachineConstraint {
        uuid: constraint_uuid,
        arch,
        cpu_cores: to_big_int("cpu-cores", constraints.cpu_cores)?,
        cpu_power: to_big_int("cpu-power", constraints.cpu_power)?,
        mem_mib: to_big_int("mem", constraints.mem_mib)?,
        root_disk_mib: to_big_int("root-disk", constraints.root_disk_mib)?,
        root_disk_source: constraints.root_disk_source.clone(),
        instance_role: constraints.instance_role.clone(),
        instance_type: constraints.instance_type.clone(),
        container_type_id,
        virt_type: constraints.virt_type.clone(),
        allocate_public_ip: constraints.allocate_public_ip,
        image_id: constraints.image_id.clone(),
    };
    {
        use db::schema::machine_constraint::dsl;
        diesel::insert_into(dsl::machine_constraint)
            .values(row)
            .execute_async(conn)
            .await?;
    }

    if let Some(tags) = &constraints.tags {
        use db::schema::constraint_tag::dsl;
        let rows = tags
            .iter()
            .map(|tag| ConstraintTag {
                constraint_uuid,
                tag: tag.clone(),
            })
            .collect::<Vec<_>>();
        diesel::insert_into(dsl::constraint_tag)
            .values(rows)
            .execute_async(conn)
            .await?;
    }

    if let Some(spaces) = &constraints.spaces {
        use db::schema::constraint_space::dsl;
        let mut rows = Vec::with_capacity(spaces.len());
        for space in spaces {
            ensure_space_exists(conn, &space.space).await?;
            rows.push(ConstraintSpace {
                constraint_uuid,
                space: space.space.clone(),
                exclude: space.exclude,
            });
        }
        diesel::insert_into(dsl::constraint_space)
            .values(rows)
            .execute_async(conn)
            .await?;
    }

    if let Some(zones) = &constraints.zones {
        use db::schema::constraint_zone::dsl;
        let rows = zones
            .iter()
            .map(|zone| ConstraintZone {
                constraint_uuid,
                zone: zone.clone(),
            })
            .collect::<Vec<_>>();
        diesel::insert_into(dsl::constraint_zone)
            .values(rows)
            .execute_async(conn)
            .await?;
    }

    Ok(())
}

/// Resolves a container type to the id its lookup table assigns it.
pub(crate) async fn container_type_id_for(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    container_type: external::ContainerType,
) -> Result<i32, TxnError> {
    use db::schema::container_type::dsl;
    dsl::container_type
        .filter(dsl::name.eq(container_type.to_string()))
        .select(dsl::id)
        .first_async::<i32>(conn)
        .await
        .optional()?
        .ok_or_else(|| {
            TxnError::CustomError(Error::invalid_constraints(&format!(
                "container type {:?} does not exist",
                container_type.to_string(),
            )))
        })
}

async fn ensure_space_exists(
    conn: &async_bb8_diesel::Connection<DbConnection>,
    space_name: &str,
) -> Result<(), TxnError> {
    use db::schema::space::dsl;
    dsl::space
        .filter(dsl::name.eq(space_name.to_string()))
        .select(dsl::uuid)
        .first_async::<SqlUuid>(conn)
        .await
        .optional()?
        .map(|_| ())
        .ok_or_else(|| {
            TxnError::CustomError(Error::invalid_constraints(&format!(
                "space {:?} does not exist",
                space_name,
            )))
        })
}

fn to_big_int(field: &str, value: Option<u64>) -> Result<Option<i64>, TxnError> {
    value
        .map(|v| {
            i64::try_from(v).map_err(|_| {
                TxnError::CustomError(Error::invalid_constraints(&format!(
                    "{} value {} is out of range",
                    field, v
                )))
            })
        })
        .transpose()
}

impl DataStore {
    /// Reassembles the constraints recorded for a machine at creation
    /// time.
    pub async fn machine_constraints(
        &self,
        opctx: &OpContext,
        machine: &external::MachineName,
    ) -> LookupResult<external::Constraints> {
        let conn = self.pool_connection().await?;

        let constraint_uuid: Option<SqlUuid> = {
            use db::schema::machine::dsl;
            dsl::machine
                .filter(dsl::name.eq(Name(machine.clone())))
                .select(dsl::constraint_uuid)
                .first_async::<Option<SqlUuid>>(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(
                        e,
                        ErrorHandler::NotFoundByLookup(
                            ResourceType::Machine,
                            LookupType::from(machine),
                        ),
                    )
                })?
        };
        let Some(constraint_uuid) = constraint_uuid else {
            return Ok(external::Constraints::default());
        };

        debug!(
            opctx.log,
            "reading machine constraints";
            "machine" => machine.as_str(),
        );

        let row: MachineConstraint = {
            use db::schema::machine_constraint::dsl;
            dsl::machine_constraint
                .filter(dsl::uuid.eq(constraint_uuid))
                .select(MachineConstraint::as_select())
                .first_async(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(e, ErrorHandler::Server)
                })?
        };

        let tags: Vec<String> = {
            use db::schema::constraint_tag::dsl;
            dsl::constraint_tag
                .filter(dsl::constraint_uuid.eq(constraint_uuid))
                .select(dsl::tag)
                .load_async(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(e, ErrorHandler::Server)
                })?
        };

        let spaces: Vec<(String, bool)> = {
            use db::schema::constraint_space::dsl;
            dsl::constraint_space
                .filter(dsl::constraint_uuid.eq(constraint_uuid))
                .select((dsl::space, dsl::exclude))
                .load_async(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(e, ErrorHandler::Server)
                })?
        };

        let zones: Vec<String> = {
            use db::schema::constraint_zone::dsl;
            dsl::constraint_zone
                .filter(dsl::constraint_uuid.eq(constraint_uuid))
                .select(dsl::zone)
                .load_async(&*conn)
                .await
                .map_err(|e| {
                    public_error_from_diesel(e, ErrorHandler::Server)
                })?
        };

        let arch = row
            .arch
            .map(|code| {
                architecture_from_code(code)
                    .map_err(|e| Error::internal_error(&e))
            })
            .transpose()?;
        let container = row
            .container_type_id
            .map(|id| {
                container_type_from_id(id)
                    .map_err(|e| Error::internal_error(&e))
            })
            .transpose()?;

        let collection = |values: Vec<String>| {
            if values.is_empty() {
                None
            } else {
                Some(values)
            }
        };

        Ok(external::Constraints {
            arch,
            cpu_cores: row.cpu_cores.map(|v| v as u64),
            cpu_power: row.cpu_power.map(|v| v as u64),
            mem_mib: row.mem_mib.map(|v| v as u64),
            root_disk_mib: row.root_disk_mib.map(|v| v as u64),
            root_disk_source: row.root_disk_source,
            instance_role: row.instance_role,
            instance_type: row.instance_type,
            container,
            virt_type: row.virt_type,
            allocate_public_ip: row.allocate_public_ip,
            image_id: row.image_id,
            tags: collection(tags),
            spaces: if spaces.is_empty() {
                None
            } else {
                Some(
                    spaces
                        .into_iter()
                        .map(|(space, exclude)| external::SpaceConstraint {
                            space,
                            exclude,
                        })
                        .collect(),
                )
            },
            zones: collection(zones),
        })
    }
}
