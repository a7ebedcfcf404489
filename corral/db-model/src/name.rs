// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use corral_common::api::external;
use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, ToSql};
use diesel::sql_types;
use diesel::sqlite::Sqlite;
use parse_display::Display;
use ref_cast::RefCast;
use serde::{Deserialize, Serialize};

/// Newtype wrapper around [`external::MachineName`].
#[derive(
    Clone,
    Debug,
    Display,
    AsExpression,
    FromSqlRow,
    Eq,
    Hash,
    PartialEq,
    Ord,
    PartialOrd,
    RefCast,
    Serialize,
    Deserialize,
)]
#[diesel(sql_type = sql_types::Text)]
#[serde(transparent)]
#[repr(transparent)]
#[display("{0}")]
pub struct Name(pub external::MachineName);

NewtypeFrom! { () pub struct Name(external::MachineName); }
NewtypeDeref! { () pub struct Name(external::MachineName); }

impl ToSql<sql_types::Text, Sqlite> for Name {
    fn to_sql<'a>(
        &'a self,
        out: &mut serialize::Output<'a, '_, Sqlite>,
    ) -> serialize::Result {
        out.set_value(self.as_str().to_owned());
        Ok(serialize::IsNull::No)
    }
}

// Deserialize the "Name" object from SQL TEXT.
impl FromSql<sql_types::Text, Sqlite> for Name {
    fn from_sql(
        value: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        <String as FromSql<sql_types::Text, Sqlite>>::from_sql(value)?
            .parse()
            .map(Name)
            .map_err(|e: String| e.into())
    }
}
