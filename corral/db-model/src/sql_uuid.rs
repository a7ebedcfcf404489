// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, ToSql};
use diesel::sql_types;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Newtype wrapper storing a [`Uuid`] as its canonical TEXT form.
///
/// SQLite has no native uuid type; every uuid column in the schema is
/// TEXT and goes through this wrapper.
#[derive(
    Clone,
    Copy,
    Debug,
    AsExpression,
    FromSqlRow,
    Eq,
    Hash,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
)]
#[diesel(sql_type = sql_types::Text)]
#[serde(transparent)]
#[repr(transparent)]
pub struct SqlUuid(pub Uuid);

NewtypeFrom! { () pub struct SqlUuid(Uuid); }
NewtypeDeref! { () pub struct SqlUuid(Uuid); }

impl SqlUuid {
    pub fn new_v4() -> SqlUuid {
        SqlUuid(Uuid::new_v4())
    }
}

impl fmt::Display for SqlUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql<sql_types::Text, Sqlite> for SqlUuid {
    fn to_sql<'a>(
        &'a self,
        out: &mut serialize::Output<'a, '_, Sqlite>,
    ) -> serialize::Result {
        out.set_value(self.0.to_string());
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<sql_types::Text, Sqlite> for SqlUuid {
    fn from_sql(
        value: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<sql_types::Text, Sqlite>>::from_sql(value)?;
        Ok(SqlUuid(Uuid::parse_str(&s)?))
    }
}
