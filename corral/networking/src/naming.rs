// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deterministic bridge names for host devices.

/// Linux limits interface names to 15 bytes (IFNAMSIZ minus the NUL).
const DEVICE_NAME_LIMIT: usize = 15;

const BRIDGE_PREFIX: &str = "br-";

/// Derives the bridge name for a host device that needs one.
///
/// The common case is `br-<device>`. When that would exceed the kernel's
/// interface-name limit, the name is squeezed to `b-<hash>-<tail>` where
/// `<hash>` is six hex digits derived from the full device name and
/// `<tail>` is its last six bytes. Same input, same output, so repeated
/// placements on the same host agree on names without coordination.
pub fn bridge_name_for_device(device_name: &str) -> String {
    let simple = format!("{BRIDGE_PREFIX}{device_name}");
    if simple.len() <= DEVICE_NAME_LIMIT {
        return simple;
    }
    // "b-" + 6 hex + "-" + 6-byte tail = 15 bytes.
    let hash = fnv1a_32(device_name.as_bytes()) & 0x00ff_ffff;
    let tail_len = DEVICE_NAME_LIMIT - 2 - 6 - 1;
    let tail_start = device_name
        .char_indices()
        .rev()
        .nth(tail_len - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("b-{:06x}-{}", hash, &device_name[tail_start..])
}

// FNV-1a, 32-bit. Small, stable across releases, and collisions only
// matter within one host's device list.
fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_short_names_get_plain_prefix() {
        assert_eq!(bridge_name_for_device("eth0"), "br-eth0");
        assert_eq!(bridge_name_for_device("bond0.100"), "br-bond0.100");
        // Exactly at the limit: "br-" + 12 bytes.
        assert_eq!(
            bridge_name_for_device("abcdefghijkl"),
            "br-abcdefghijkl"
        );
    }

    #[test]
    fn test_long_names_are_squeezed() {
        let name = bridge_name_for_device("enp0s20f0u1u2i3");
        assert_eq!(name.len(), DEVICE_NAME_LIMIT);
        assert!(name.starts_with("b-"));
        assert!(name.ends_with("-u1u2i3"));
    }

    #[test]
    fn test_squeezed_names_are_deterministic_and_distinct() {
        let a = bridge_name_for_device("enp0s20f0u1u2i3");
        let b = bridge_name_for_device("enp0s20f0u1u2i3");
        assert_eq!(a, b);
        // Same tail, different full name: the hash keeps them apart.
        let c = bridge_name_for_device("enp9s99f9u1u2i3");
        assert_ne!(a, c);
    }
}
