// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chooses host bridges for a container's NICs.
//!
//! The policy never touches storage. Callers fetch the host's devices
//! and the space definitions, then ask either which existing bridges the
//! container should attach to, or which host devices still need a bridge
//! created over them before attachment can succeed.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use corral_common::api::external::DeviceType;
use corral_common::api::external::VirtualPortType;
use ipnetwork::IpNetwork;
use itertools::Itertools;

use crate::naming::bridge_name_for_device;
use crate::sort::natural_sort;

/// Bridge used for every container NIC under local networking.
pub const DEFAULT_CONTAINER_BRIDGE: &str = "lxdbr0";

/// How containers on this model reach the outside world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerNetworkingMethod {
    /// NAT through the default container bridge on the host.
    Local,
    /// Bridged directly onto provider networks.
    Provider,
}

/// One host link-layer device, with the addresses currently assigned to
/// it. This is the policy's entire view of the host.
#[derive(Clone, Debug)]
pub struct HostDevice {
    pub name: String,
    pub device_type: DeviceType,
    pub virtual_port_type: VirtualPortType,
    pub parent_name: Option<String>,
    pub addresses: Vec<IpNetwork>,
}

/// A space and the subnets that define membership in it.
#[derive(Clone, Debug)]
pub struct SpaceInfo {
    pub name: String,
    pub subnets: Vec<IpNetwork>,
}

/// A bridging action the caller must perform on the host: create
/// `bridge_name` over `device_name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceToBridge {
    pub device_name: String,
    pub bridge_name: String,
}

/// A container NIC paired with the host bridge it attaches to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerDevice {
    pub container_device_name: String,
    pub host_bridge_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgePolicyError {
    #[error("host machine {host} has no available device in space(s) {spaces}")]
    NoAvailableDevice { host: String, spaces: String },

    #[error(
        "unable to find host bridge for space(s) {spaces} \
         for container {container}"
    )]
    MissingHostBridge { spaces: String, container: String },

    #[error(
        "no obvious space for container {container}; \
         host machine has spaces: {spaces}"
    )]
    NoObviousSpace { container: String, spaces: String },
}

/// The set of spaces a resolution strategy settled on.
enum SpaceSelection {
    /// Classify devices against these named spaces.
    Spaces(Vec<String>),
    /// Topology is fully unknown; any existing bridge will do.
    AllBridged,
}

pub struct BridgePolicy<'a> {
    networking_method: ContainerNetworkingMethod,
    host: &'a str,
    container: &'a str,
}

impl<'a> BridgePolicy<'a> {
    pub fn new(
        networking_method: ContainerNetworkingMethod,
        host: &'a str,
        container: &'a str,
    ) -> BridgePolicy<'a> {
        BridgePolicy { networking_method, host, container }
    }

    /// Pairs the container's NICs (`eth0`, `eth1`, ...) with existing
    /// host bridges, one per chosen bridge in natural name order.
    pub fn populate_container_devices(
        &self,
        host_devices: &[HostDevice],
        spaces: &[SpaceInfo],
        constraint_spaces: &[String],
    ) -> Result<Vec<ContainerDevice>, BridgePolicyError> {
        if self.networking_method == ContainerNetworkingMethod::Local {
            return Ok(vec![ContainerDevice {
                container_device_name: "eth0".to_string(),
                host_bridge_name: DEFAULT_CONTAINER_BRIDGE.to_string(),
            }]);
        }

        let mut bridge_names = match self.select_spaces(
            host_devices,
            spaces,
            constraint_spaces,
        )? {
            SpaceSelection::Spaces(requested) => {
                let by_space =
                    self.classify_devices(host_devices, spaces, &requested)?;
                let mut bridges = BTreeSet::new();
                let mut unbridged_spaces = Vec::new();
                for (space, devices) in &by_space {
                    let reusable = self.reusable_bridges(devices, host_devices);
                    if reusable.is_empty() {
                        unbridged_spaces.push(space.clone());
                    } else {
                        bridges.extend(reusable);
                    }
                }
                if !unbridged_spaces.is_empty() {
                    return Err(BridgePolicyError::MissingHostBridge {
                        spaces: format_spaces(&unbridged_spaces),
                        container: self.container.to_string(),
                    });
                }
                bridges.into_iter().collect::<Vec<_>>()
            }
            SpaceSelection::AllBridged => {
                let all: Vec<&HostDevice> = host_devices.iter().collect();
                let bridges = self.reusable_bridges(&all, host_devices);
                if bridges.is_empty() {
                    return Err(BridgePolicyError::NoAvailableDevice {
                        host: self.host.to_string(),
                        spaces: "(unknown)".to_string(),
                    });
                }
                bridges.into_iter().collect::<Vec<_>>()
            }
        };

        natural_sort(&mut bridge_names);
        Ok(bridge_names
            .into_iter()
            .enumerate()
            .map(|(i, bridge)| ContainerDevice {
                container_device_name: format!("eth{i}"),
                host_bridge_name: bridge,
            })
            .collect())
    }

    /// Reports the host devices that sit in the container's requested
    /// spaces but have no bridge over them yet. The caller is expected
    /// to create each named bridge and retry attachment.
    pub fn devices_to_bridge(
        &self,
        host_devices: &[HostDevice],
        spaces: &[SpaceInfo],
        constraint_spaces: &[String],
    ) -> Result<Vec<DeviceToBridge>, BridgePolicyError> {
        if self.networking_method == ContainerNetworkingMethod::Local {
            return Ok(Vec::new());
        }

        let requested = match self.select_spaces(
            host_devices,
            spaces,
            constraint_spaces,
        )? {
            SpaceSelection::Spaces(requested) => requested,
            // Nothing to classify against, so nothing to bridge.
            SpaceSelection::AllBridged => return Ok(Vec::new()),
        };

        let by_space =
            self.classify_devices(host_devices, spaces, &requested)?;
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        for devices in by_space.values() {
            for device in devices {
                if !self.needs_bridge(device, host_devices) {
                    continue;
                }
                if seen.insert(device.name.clone()) {
                    result.push(DeviceToBridge {
                        device_name: device.name.clone(),
                        bridge_name: bridge_name_for_device(&device.name),
                    });
                }
            }
        }
        result.sort_by(|a, b| {
            crate::sort::natural_cmp(&a.device_name, &b.device_name)
        });
        Ok(result)
    }

    /// Runs the resolution strategies in priority order and returns the
    /// first definitive answer.
    fn select_spaces(
        &self,
        host_devices: &[HostDevice],
        spaces: &[SpaceInfo],
        constraint_spaces: &[String],
    ) -> Result<SpaceSelection, BridgePolicyError> {
        let host_spaces = known_host_spaces(host_devices, spaces);

        let strategies: [&dyn Fn() -> Option<SpaceSelection>; 3] = [
            // Spaces the container's constraints name explicitly.
            &|| {
                if constraint_spaces.is_empty() {
                    None
                } else {
                    Some(SpaceSelection::Spaces(constraint_spaces.to_vec()))
                }
            },
            // Unconstrained container on a single-space host.
            &|| {
                if host_spaces.len() == 1 {
                    Some(SpaceSelection::Spaces(
                        host_spaces.iter().cloned().collect(),
                    ))
                } else {
                    None
                }
            },
            // Fully unknown topology: no device classifies anywhere.
            &|| {
                if host_spaces.is_empty() {
                    Some(SpaceSelection::AllBridged)
                } else {
                    None
                }
            },
        ];
        for strategy in strategies {
            if let Some(selection) = strategy() {
                return Ok(selection);
            }
        }

        // Multi-space host, no constraint. Refuse to guess.
        Err(BridgePolicyError::NoObviousSpace {
            container: self.container.to_string(),
            spaces: format_spaces(
                &host_spaces.into_iter().collect::<Vec<_>>(),
            ),
        })
    }

    /// Buckets host devices into the requested spaces by address
    /// membership. Every requested space must have at least one device.
    fn classify_devices<'d>(
        &self,
        host_devices: &'d [HostDevice],
        spaces: &[SpaceInfo],
        requested: &[String],
    ) -> Result<BTreeMap<String, Vec<&'d HostDevice>>, BridgePolicyError>
    {
        let mut by_space: BTreeMap<String, Vec<&HostDevice>> =
            BTreeMap::new();
        for name in requested {
            by_space.insert(name.clone(), Vec::new());
        }
        for device in host_devices {
            if device.device_type == DeviceType::Loopback {
                continue;
            }
            for space in spaces {
                if !device_in_space(device, space) {
                    continue;
                }
                if let Some(bucket) = by_space.get_mut(&space.name) {
                    bucket.push(device);
                }
            }
        }

        let empty: Vec<String> = by_space
            .iter()
            .filter(|(_, devices)| devices.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        if !empty.is_empty() {
            return Err(BridgePolicyError::NoAvailableDevice {
                host: self.host.to_string(),
                spaces: format_spaces(&empty),
            });
        }
        Ok(by_space)
    }

    /// Names of bridges in `devices` the container can attach to
    /// directly. A NIC that already sits under a bridge contributes its
    /// parent bridge rather than itself.
    fn reusable_bridges(
        &self,
        devices: &[&HostDevice],
        all_devices: &[HostDevice],
    ) -> BTreeSet<String> {
        let mut bridges = BTreeSet::new();
        for device in devices {
            if self.is_reusable_bridge(device) {
                bridges.insert(device.name.clone());
            } else if let Some(parent) = parent_of(device, all_devices) {
                if self.is_reusable_bridge(parent) {
                    bridges.insert(parent.name.clone());
                }
            }
        }
        bridges
    }

    /// Whether the container can attach to this device as a bridge.
    /// OVS virtual ports only count under provider networking; under
    /// local they are plain NICs.
    fn is_reusable_bridge(&self, device: &HostDevice) -> bool {
        match device.virtual_port_type {
            VirtualPortType::OpenVswitch => {
                self.networking_method == ContainerNetworkingMethod::Provider
            }
            VirtualPortType::NonVirtual => {
                device.device_type == DeviceType::Bridge
            }
        }
    }

    /// A bare NIC with no bridge over it needs one created.
    fn needs_bridge(
        &self,
        device: &HostDevice,
        all_devices: &[HostDevice],
    ) -> bool {
        if device.device_type == DeviceType::Loopback
            || self.is_reusable_bridge(device)
        {
            return false;
        }
        // Already covered by an existing bridge, either above it or as
        // its parent.
        if let Some(parent) = parent_of(device, all_devices) {
            if self.is_reusable_bridge(parent) {
                return false;
            }
        }
        !all_devices.iter().any(|other| {
            other.parent_name.as_deref() == Some(device.name.as_str())
                && self.is_reusable_bridge(other)
        })
    }
}

/// Spaces the host is known to participate in, judged by whether any
/// non-loopback device has an address inside one of the space's subnets.
fn known_host_spaces(
    host_devices: &[HostDevice],
    spaces: &[SpaceInfo],
) -> BTreeSet<String> {
    let mut known = BTreeSet::new();
    for device in host_devices {
        if device.device_type == DeviceType::Loopback {
            continue;
        }
        for space in spaces {
            if device_in_space(device, space) {
                known.insert(space.name.clone());
            }
        }
    }
    known
}

fn device_in_space(device: &HostDevice, space: &SpaceInfo) -> bool {
    device.addresses.iter().any(|addr| {
        space.subnets.iter().any(|subnet| subnet.contains(addr.ip()))
    })
}

fn parent_of<'d>(
    device: &HostDevice,
    all_devices: &'d [HostDevice],
) -> Option<&'d HostDevice> {
    let parent_name = device.parent_name.as_deref()?;
    all_devices.iter().find(|d| d.name == parent_name)
}

fn format_spaces(spaces: &[String]) -> String {
    if spaces.is_empty() {
        return "(none)".to_string();
    }
    spaces.iter().sorted().join(", ")
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    fn subnet(cidr: &str) -> IpNetwork {
        cidr.parse().unwrap()
    }

    fn nic(name: &str, addrs: &[&str]) -> HostDevice {
        HostDevice {
            name: name.to_string(),
            device_type: DeviceType::Ethernet,
            virtual_port_type: VirtualPortType::NonVirtual,
            parent_name: None,
            addresses: addrs.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }

    fn bridge(name: &str, addrs: &[&str]) -> HostDevice {
        HostDevice {
            device_type: DeviceType::Bridge,
            ..nic(name, addrs)
        }
    }

    fn ovs(name: &str, addrs: &[&str]) -> HostDevice {
        HostDevice {
            virtual_port_type: VirtualPortType::OpenVswitch,
            ..nic(name, addrs)
        }
    }

    fn with_parent(mut device: HostDevice, parent: &str) -> HostDevice {
        device.parent_name = Some(parent.to_string());
        device
    }

    fn somespace() -> SpaceInfo {
        SpaceInfo {
            name: "somespace".to_string(),
            subnets: vec![subnet("10.0.0.0/24")],
        }
    }

    fn policy(method: ContainerNetworkingMethod) -> BridgePolicy<'static> {
        BridgePolicy::new(method, "0", "0/lxd/0")
    }

    #[test]
    fn test_local_method_always_uses_default_bridge() {
        let policy = policy(ContainerNetworkingMethod::Local);
        // Even with an OVS bridge and space topology present, local
        // networking ignores everything on the host.
        let devices =
            vec![ovs("ovsbr0", &["10.0.0.2/24"]), nic("eth0", &[])];
        let spaces = vec![somespace()];

        let populated = policy
            .populate_container_devices(&devices, &spaces, &[])
            .unwrap();
        assert_eq!(
            populated,
            vec![ContainerDevice {
                container_device_name: "eth0".to_string(),
                host_bridge_name: DEFAULT_CONTAINER_BRIDGE.to_string(),
            }]
        );
        assert!(policy
            .devices_to_bridge(&devices, &spaces, &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_single_space_host_reuses_bridge() {
        let policy = policy(ContainerNetworkingMethod::Provider);
        let devices = vec![
            with_parent(nic("eth0", &[]), "br-eth0"),
            bridge("br-eth0", &["10.0.0.2/24"]),
        ];
        let spaces = vec![somespace()];

        // Container declares no spaces; the host's single known space
        // wins.
        let populated = policy
            .populate_container_devices(&devices, &spaces, &[])
            .unwrap();
        assert_eq!(
            populated,
            vec![ContainerDevice {
                container_device_name: "eth0".to_string(),
                host_bridge_name: "br-eth0".to_string(),
            }]
        );
        assert!(policy
            .devices_to_bridge(&devices, &spaces, &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_bare_nic_needs_bridge_and_blocks_population() {
        let policy = policy(ContainerNetworkingMethod::Provider);
        let devices = vec![nic("eth0", &["10.0.0.2/24"])];
        let spaces = vec![somespace()];
        let constraint = vec!["somespace".to_string()];

        let missing = policy
            .devices_to_bridge(&devices, &spaces, &constraint)
            .unwrap();
        assert_eq!(
            missing,
            vec![DeviceToBridge {
                device_name: "eth0".to_string(),
                bridge_name: "br-eth0".to_string(),
            }]
        );

        let err = policy
            .populate_container_devices(&devices, &spaces, &constraint)
            .unwrap_err();
        assert_matches!(
            err,
            BridgePolicyError::MissingHostBridge { ref spaces, .. }
                if spaces == "somespace"
        );
    }

    #[test]
    fn test_multi_space_host_without_constraint_is_ambiguous() {
        let policy = policy(ContainerNetworkingMethod::Provider);
        let devices = vec![
            bridge("br-eth0", &["10.0.0.2/24"]),
            bridge("br-eth1", &["10.1.0.2/24"]),
        ];
        let spaces = vec![
            somespace(),
            SpaceInfo {
                name: "otherspace".to_string(),
                subnets: vec![subnet("10.1.0.0/24")],
            },
        ];

        let err = policy
            .populate_container_devices(&devices, &spaces, &[])
            .unwrap_err();
        assert_matches!(err, BridgePolicyError::NoObviousSpace { .. });
        assert!(err.to_string().contains("no obvious space for container"));
    }

    #[test]
    fn test_constraint_disambiguates_multi_space_host() {
        let policy = policy(ContainerNetworkingMethod::Provider);
        let devices = vec![
            bridge("br-eth0", &["10.0.0.2/24"]),
            bridge("br-eth1", &["10.1.0.2/24"]),
        ];
        let spaces = vec![
            somespace(),
            SpaceInfo {
                name: "otherspace".to_string(),
                subnets: vec![subnet("10.1.0.0/24")],
            },
        ];

        let populated = policy
            .populate_container_devices(
                &devices,
                &spaces,
                &["otherspace".to_string()],
            )
            .unwrap();
        assert_eq!(populated[0].host_bridge_name, "br-eth1");
        assert_eq!(populated.len(), 1);
    }

    #[test]
    fn test_unknown_topology_falls_back_to_any_bridge() {
        let policy = policy(ContainerNetworkingMethod::Provider);
        // No device address classifies into any known space.
        let devices = vec![
            bridge("br-eth0", &["192.168.5.2/24"]),
            nic("eth1", &["192.168.6.2/24"]),
        ];
        let spaces = vec![somespace()];

        let populated = policy
            .populate_container_devices(&devices, &spaces, &[])
            .unwrap();
        assert_eq!(populated[0].host_bridge_name, "br-eth0");
        assert_eq!(populated.len(), 1);
        assert!(policy
            .devices_to_bridge(&devices, &spaces, &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_requested_space_with_no_devices_fails() {
        let policy = policy(ContainerNetworkingMethod::Provider);
        let devices = vec![bridge("br-eth0", &["10.0.0.2/24"])];
        let spaces = vec![somespace()];

        let err = policy
            .populate_container_devices(
                &devices,
                &spaces,
                &["somespace".to_string(), "missing".to_string()],
            )
            .unwrap_err();
        assert_matches!(
            err,
            BridgePolicyError::NoAvailableDevice { ref spaces, .. }
                if spaces == "missing"
        );
    }

    #[test]
    fn test_ovs_port_counts_as_bridge_only_under_provider() {
        let devices = vec![ovs("ovsbr0", &["10.0.0.2/24"])];
        let spaces = vec![somespace()];
        let constraint = vec!["somespace".to_string()];

        let provider = policy(ContainerNetworkingMethod::Provider);
        let populated = provider
            .populate_container_devices(&devices, &spaces, &constraint)
            .unwrap();
        assert_eq!(populated[0].host_bridge_name, "ovsbr0");

        // Under provider networking the OVS port is already a bridge,
        // so nothing needs bridging.
        assert!(provider
            .devices_to_bridge(&devices, &spaces, &constraint)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_bridges_pair_with_nics_in_natural_order() {
        let policy = policy(ContainerNetworkingMethod::Provider);
        let devices = vec![
            bridge("br-eth10", &["10.0.0.3/24"]),
            bridge("br-eth2", &["10.0.0.2/24"]),
        ];
        let spaces = vec![somespace()];

        let populated = policy
            .populate_container_devices(&devices, &spaces, &[])
            .unwrap();
        assert_eq!(
            populated,
            vec![
                ContainerDevice {
                    container_device_name: "eth0".to_string(),
                    host_bridge_name: "br-eth2".to_string(),
                },
                ContainerDevice {
                    container_device_name: "eth1".to_string(),
                    host_bridge_name: "br-eth10".to_string(),
                },
            ]
        );
    }
}
