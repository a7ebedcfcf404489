// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Describes the Diesel database schema.
//!
//! NOTE: Should be kept up-to-date with dbinit.sql.

table! {
    container_type (id) {
        id -> Integer,
        name -> Text,
    }
}

table! {
    link_layer_device_type (id) {
        id -> Integer,
        name -> Text,
    }
}

table! {
    virtual_port_type (id) {
        id -> Integer,
        name -> Text,
    }
}

table! {
    sequence (namespace) {
        namespace -> Text,
        value -> BigInt,
    }
}

table! {
    space (uuid) {
        uuid -> Text,
        name -> Text,
    }
}

table! {
    subnet (uuid) {
        uuid -> Text,
        cidr -> Text,
        space_uuid -> Text,
        provider_id -> Nullable<Text>,
    }
}

table! {
    subnet_availability_zone (subnet_uuid, name) {
        subnet_uuid -> Text,
        name -> Text,
    }
}

table! {
    net_node (uuid) {
        uuid -> Text,
    }
}

table! {
    machine_constraint (uuid) {
        uuid -> Text,
        arch -> Nullable<Integer>,
        cpu_cores -> Nullable<BigInt>,
        cpu_power -> Nullable<BigInt>,
        mem_mib -> Nullable<BigInt>,
        root_disk_mib -> Nullable<BigInt>,
        root_disk_source -> Nullable<Text>,
        instance_role -> Nullable<Text>,
        instance_type -> Nullable<Text>,
        container_type_id -> Nullable<Integer>,
        virt_type -> Nullable<Text>,
        allocate_public_ip -> Nullable<Bool>,
        image_id -> Nullable<Text>,
    }
}

table! {
    constraint_tag (constraint_uuid, tag) {
        constraint_uuid -> Text,
        tag -> Text,
    }
}

table! {
    constraint_space (constraint_uuid, space) {
        constraint_uuid -> Text,
        space -> Text,
        exclude -> Bool,
    }
}

table! {
    constraint_zone (constraint_uuid, zone) {
        constraint_uuid -> Text,
        zone -> Text,
    }
}

table! {
    machine (uuid) {
        uuid -> Text,
        name -> Text,
        net_node_uuid -> Text,
        life -> Integer,
        nonce -> Nullable<Text>,
        constraint_uuid -> Nullable<Text>,
    }
}

table! {
    machine_platform (machine_uuid) {
        machine_uuid -> Text,
        os_type -> Integer,
        channel -> Nullable<Text>,
        architecture -> Integer,
    }
}

table! {
    machine_cloud_instance (machine_uuid) {
        machine_uuid -> Text,
        life -> Integer,
        instance_id -> Nullable<Text>,
    }
}

table! {
    machine_status (machine_uuid) {
        machine_uuid -> Text,
        status -> Integer,
        updated_at -> TimestamptzSqlite,
    }
}

table! {
    machine_cloud_instance_status (machine_uuid) {
        machine_uuid -> Text,
        status -> Integer,
        updated_at -> TimestamptzSqlite,
    }
}

table! {
    machine_container_type (machine_uuid, container_type_id) {
        machine_uuid -> Text,
        container_type_id -> Integer,
    }
}

table! {
    machine_parent (machine_uuid) {
        machine_uuid -> Text,
        parent_uuid -> Text,
    }
}

table! {
    machine_placement (machine_uuid) {
        machine_uuid -> Text,
        scope -> Integer,
        directive -> Text,
    }
}

table! {
    machine_requires_reboot (machine_uuid) {
        machine_uuid -> Text,
        created_at -> TimestamptzSqlite,
    }
}

table! {
    link_layer_device (uuid) {
        uuid -> Text,
        net_node_uuid -> Text,
        name -> Text,
        mtu -> Nullable<BigInt>,
        mac_address -> Nullable<Text>,
        device_type_id -> Integer,
        virtual_port_type_id -> Integer,
        is_auto_start -> Bool,
        is_enabled -> Bool,
    }
}

table! {
    link_layer_device_parent (device_uuid) {
        device_uuid -> Text,
        parent_uuid -> Text,
    }
}

table! {
    provider_link_layer_device (provider_id) {
        provider_id -> Text,
        device_uuid -> Text,
    }
}

table! {
    ip_address (uuid) {
        uuid -> Text,
        net_node_uuid -> Text,
        device_uuid -> Text,
        address -> Text,
        address_type_id -> Integer,
        config_type_id -> Integer,
        origin_id -> Integer,
        scope_id -> Integer,
        is_secondary -> Bool,
        is_shadow -> Bool,
    }
}

allow_tables_to_appear_in_same_query!(
    machine,
    net_node,
    machine_parent,
    machine_constraint,
    constraint_space,
    link_layer_device,
    link_layer_device_parent,
    provider_link_layer_device,
    ip_address,
    space,
    subnet,
);
