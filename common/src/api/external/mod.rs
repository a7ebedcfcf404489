// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data structures and related facilities for representing resources in
//! the corral API
//!
//! This includes all the types the datastore accepts and returns:
//! machine names, placement directives, constraints, and the link-layer
//! device vocabulary.

mod error;

pub use error::Error;
pub use error::InternalContext;
pub use error::LookupType;

use parse_display::Display;
use parse_display::FromStr;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::fmt::Formatter;
use uuid::Uuid;

/// Result of a create operation for the specified type
pub type CreateResult<T> = Result<T, Error>;
/// Result of a delete operation for the specified type
pub type DeleteResult = Result<(), Error>;
/// Result of a list operation that returns a vector
pub type ListResultVec<T> = Result<Vec<T>, Error>;
/// Result of a lookup operation for the specified type
pub type LookupResult<T> = Result<T, Error>;

/// Identifies a type of resource for error reporting
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum ResourceType {
    Machine,
    NetNode,
    Space,
    Subnet,
    ContainerType,
    LinkLayerDevice,
    IpAddress,
    SequenceNamespace,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResourceType::Machine => "machine",
                ResourceType::NetNode => "net node",
                ResourceType::Space => "space",
                ResourceType::Subnet => "subnet",
                ResourceType::ContainerType => "container type",
                ResourceType::LinkLayerDevice => "link layer device",
                ResourceType::IpAddress => "ip address",
                ResourceType::SequenceNamespace => "sequence namespace",
            }
        )
    }
}

/// The lifecycle state of a machine
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[display(style = "lowercase")]
pub enum Life {
    Alive,
    Dying,
    Dead,
}

/// The kind of container a machine hosts or is hosted in
///
/// LXD is the only container type the placement subsystem supports
/// today, but the type is closed and encoded explicitly so that adding
/// another kind is a compile-visible change.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[display(style = "lowercase")]
pub enum ContainerType {
    Lxd,
}

/// A machine CPU architecture
///
/// `Unknown` is a deliberate member: platform rows written before an
/// instance is provisioned (e.g. the charm upload path) legitimately
/// carry no architecture. An unrecognized architecture *string* is a
/// parse error, never `Unknown`.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    PartialEq,
    Serialize,
)]
#[display(style = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
    Ppc64el,
    S390x,
    Riscv64,
    Unknown,
}

/// Host operating system type for a machine platform
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    PartialEq,
    Serialize,
)]
#[display(style = "lowercase")]
pub enum OsType {
    Ubuntu,
    Centos,
    GenericLinux,
}

/// The OS/architecture combination a machine should run
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Platform {
    pub os_type: OsType,
    /// OS channel/series, e.g. "22.04/stable". Nullable in storage.
    pub channel: Option<String>,
    pub architecture: Architecture,
}

/// The human-facing name of a machine
///
/// Top-level machines are decimal strings ("0", "1", ...); containers are
/// `<parent>/<container-type>/<n>` ("0/lxd/1"). Nesting is exactly one
/// level deep.
#[derive(
    Clone,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct MachineName(String);

impl MachineName {
    /// Name for a top-level machine from its sequence number.
    pub fn new(sequence: u64) -> MachineName {
        MachineName(sequence.to_string())
    }

    /// Name for a container nested under `parent`.
    pub fn container(
        parent: &MachineName,
        container_type: ContainerType,
        sequence: u64,
    ) -> MachineName {
        MachineName(format!("{}/{}/{}", parent.0, container_type, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this machine is a container on another machine.
    pub fn is_container(&self) -> bool {
        self.0.contains('/')
    }

    /// The name of the host machine, for a container name.
    pub fn parent(&self) -> Option<MachineName> {
        self.0.split('/').next().filter(|_| self.is_container()).map(|p| {
            MachineName(p.to_owned())
        })
    }
}

impl fmt::Display for MachineName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<MachineName> for String {
    fn from(name: MachineName) -> String {
        name.0
    }
}

impl TryFrom<String> for MachineName {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for MachineName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let is_number = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
        };
        let parts = value.split('/').collect::<Vec<_>>();
        let ok = match parts.as_slice() {
            [n] => is_number(n),
            [n, ct, m] => {
                is_number(n)
                    && ct.parse::<ContainerType>().is_ok()
                    && is_number(m)
            }
            _ => false,
        };
        if !ok {
            return Err(format!(
                "machine name {:?} is not of the form \"<n>\" or \
                 \"<n>/<container-type>/<m>\"",
                value
            ));
        }
        Ok(MachineName(value.to_owned()))
    }
}

/// One space a machine's constraints pin it to (or exclude it from)
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SpaceConstraint {
    pub space: String,
    pub exclude: bool,
}

/// Hardware and placement constraints for a machine
///
/// Write-once at machine creation; the spaces named here must exist at
/// write time.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Constraints {
    pub arch: Option<Architecture>,
    pub cpu_cores: Option<u64>,
    pub cpu_power: Option<u64>,
    pub mem_mib: Option<u64>,
    pub root_disk_mib: Option<u64>,
    pub root_disk_source: Option<String>,
    pub instance_role: Option<String>,
    pub instance_type: Option<String>,
    pub container: Option<ContainerType>,
    pub virt_type: Option<String>,
    pub allocate_public_ip: Option<bool>,
    pub image_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub spaces: Option<Vec<SpaceConstraint>>,
    pub zones: Option<Vec<String>>,
}

/// Where and how a new machine should be sited
///
/// Exactly one variant is active per placement request. There is no
/// "unrecognized" case: exhaustiveness is the compiler's job.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Placement {
    /// No directive; the caller just needs *a* machine.
    Unset,
    /// Attach to the named existing machine.
    Machine(MachineName),
    /// Create a container, on the named parent if given, else on a fresh
    /// machine.
    Container {
        container_type: ContainerType,
        parent: Option<MachineName>,
    },
    /// Pass an opaque directive through to the provisioning layer.
    Provider(String),
}

/// Arguments for creating (or resolving) a machine via placement
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AddMachineArgs {
    pub platform: Platform,
    pub constraints: Constraints,
    /// Anti-replay token recorded at provisioning time.
    pub nonce: Option<String>,
    pub placement: Placement,
}

/// The type of a link-layer device
///
/// `Unknown` is a legitimate member reported by host inspection; an
/// unrecognized *string* fails to parse.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    PartialEq,
    Serialize,
)]
pub enum DeviceType {
    #[display("unknown")]
    Unknown,
    #[display("loopback")]
    Loopback,
    #[display("ethernet")]
    Ethernet,
    #[display("802.1q")]
    Vlan8021Q,
    #[display("bond")]
    Bond,
    #[display("bridge")]
    Bridge,
    #[display("vxlan")]
    Vxlan,
}

/// Whether a device is an ordinary port or a virtual switch port
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    PartialEq,
    Serialize,
)]
pub enum VirtualPortType {
    #[display("nonvirtualport")]
    NonVirtual,
    #[display("openvswitch")]
    OpenVswitch,
}

/// How an IP address was configured on its device
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    PartialEq,
    Serialize,
)]
#[display(style = "lowercase")]
pub enum AddressConfigType {
    Unknown,
    Dhcp,
    Static,
    Manual,
    Loopback,
}

/// Who reported an IP address
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    PartialEq,
    Serialize,
)]
#[display(style = "lowercase")]
pub enum AddressOrigin {
    Machine,
    Provider,
}

/// Routability scope of an IP address
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    FromStr,
    PartialEq,
    Serialize,
)]
pub enum AddressScope {
    #[display("unknown")]
    Unknown,
    #[display("public")]
    Public,
    #[display("local-cloud")]
    CloudLocal,
    #[display("local-machine")]
    MachineLocal,
    #[display("link-local")]
    LinkLocal,
}

/// One observed link-layer device, denormalized for bulk import
///
/// `machine_id` qualifies `name` and `parent_device_name`: devices on
/// different machines may share local names without colliding. The
/// caller resolves `machine_id` to `net_node_uuid` up front (see
/// `all_machines_and_net_nodes`).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImportLinkLayerDevice {
    pub uuid: Uuid,
    pub net_node_uuid: Uuid,
    pub machine_id: MachineName,
    pub name: String,
    pub mtu: Option<i64>,
    pub mac_address: Option<macaddr::MacAddr6>,
    pub device_type: DeviceType,
    pub virtual_port_type: VirtualPortType,
    pub parent_device_name: Option<String>,
    pub provider_id: Option<String>,
    pub is_auto_start: bool,
    pub is_enabled: bool,
}

/// What a machine should do when asked to reboot, given its nesting
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RebootAction {
    ShouldDoNothing,
    ShouldReboot,
    ShouldShutdown,
}
