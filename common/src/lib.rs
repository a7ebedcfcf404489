// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared by the corral control plane components.
//!
//! The datastore, the bridge policy engine, and the service layer above
//! them all speak in terms of these types. Nothing in here touches the
//! database or the network.

pub mod api;
