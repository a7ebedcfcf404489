// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structures stored to the database.

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate newtype_derive;

mod constraints;
mod ip_address;
mod link_layer;
mod mac_addr;
mod machine;
mod name;
mod network;
pub mod schema;
mod sequence;
mod sql_uuid;

pub use constraints::*;
pub use ip_address::*;
pub use link_layer::*;
pub use mac_addr::*;
pub use machine::*;
pub use name::*;
pub use network::*;
pub use sequence::*;
pub use sql_uuid::*;

/// The schema DDL, including seeded lookup tables.
///
/// NOTE: `schema.rs` must be kept up-to-date with this file.
pub const DBINIT_SQL: &str = include_str!("dbinit.sql");

/// This macro implements serialization and deserialization of an enum
/// type to the small integer code the corresponding lookup table assigns
/// it. Codes are closed: an unrecognized code coming back from the
/// database is a deserialization error, never a default. See [`DbLife`]
/// for a sample usage.
macro_rules! impl_enum_type {
    (
        $(#[$enum_meta:meta])*
        pub enum $model_type:ident;

        $($enum_item:ident => $sql_value:literal)+
    ) => {
        $(#[$enum_meta])*
        #[diesel(sql_type = ::diesel::sql_types::Integer)]
        pub enum $model_type {
            $(
                $enum_item,
            )*
        }

        impl $model_type {
            /// The integer code stored in the database for this variant.
            pub fn code(&self) -> i32 {
                match self {
                    $(
                        $model_type::$enum_item => $sql_value,
                    )*
                }
            }
        }

        impl
            ::diesel::serialize::ToSql<
                ::diesel::sql_types::Integer,
                ::diesel::sqlite::Sqlite,
            > for $model_type
        {
            fn to_sql<'a>(
                &'a self,
                out: &mut ::diesel::serialize::Output<
                    'a,
                    '_,
                    ::diesel::sqlite::Sqlite,
                >,
            ) -> ::diesel::serialize::Result {
                out.set_value(self.code());
                Ok(::diesel::serialize::IsNull::No)
            }
        }

        impl
            ::diesel::deserialize::FromSql<
                ::diesel::sql_types::Integer,
                ::diesel::sqlite::Sqlite,
            > for $model_type
        {
            fn from_sql(
                value: <::diesel::sqlite::Sqlite as
                    ::diesel::backend::Backend>::RawValue<'_>,
            ) -> ::diesel::deserialize::Result<Self> {
                match <i32 as ::diesel::deserialize::FromSql<
                    ::diesel::sql_types::Integer,
                    ::diesel::sqlite::Sqlite,
                >>::from_sql(value)?
                {
                    $(
                        $sql_value => Ok($model_type::$enum_item),
                    )*
                    code => Err(format!(
                        "Unrecognized {} code: {}",
                        stringify!($model_type),
                        code
                    )
                    .into()),
                }
            }
        }
    };
}

pub(crate) use impl_enum_type;
