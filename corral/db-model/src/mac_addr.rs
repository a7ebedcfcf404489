// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, ToSql};
use diesel::sql_types;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper storing a [`macaddr::MacAddr6`] as colon-separated
/// TEXT.
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
pub struct MacAddr(pub macaddr::MacAddr6);

NewtypeFrom! { () pub struct MacAddr(macaddr::MacAddr6); }
NewtypeDeref! { () pub struct MacAddr(macaddr::MacAddr6); }

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql<sql_types::Text, Sqlite> for MacAddr {
    fn to_sql<'a>(
        &'a self,
        out: &mut serialize::Output<'a, '_, Sqlite>,
    ) -> serialize::Result {
        out.set_value(self.0.to_string());
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<sql_types::Text, Sqlite> for MacAddr {
    fn from_sql(
        value: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<sql_types::Text, Sqlite>>::from_sql(value)?;
        Ok(MacAddr(s.parse::<macaddr::MacAddr6>()?))
    }
}
