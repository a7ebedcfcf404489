// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration parameters for the database

use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;

/// Describes how to find the database
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Config {
    /// Path to the SQLite database file. Created on first use if absent.
    pub path: Utf8PathBuf,
}
