// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge selection policy for container networking.
//!
//! Everything in this crate is a pure function over already-fetched host
//! topology: callers (the datastore's network surface) gather the host's
//! link-layer devices and the space/subnet definitions first, then ask
//! the policy which host bridge each container NIC should attach to, or
//! which bridges are missing and must be created before placement can
//! proceed.

mod bridge_policy;
mod naming;
mod sort;

pub use bridge_policy::BridgePolicy;
pub use bridge_policy::BridgePolicyError;
pub use bridge_policy::ContainerDevice;
pub use bridge_policy::ContainerNetworkingMethod;
pub use bridge_policy::DeviceToBridge;
pub use bridge_policy::HostDevice;
pub use bridge_policy::SpaceInfo;
pub use bridge_policy::DEFAULT_CONTAINER_BRIDGE;
pub use naming::bridge_name_for_device;
pub use sort::natural_sort;
