//! Conversions between bluer devices and coordinator device records.

use std::collections::HashSet;

use bluer::Device;
use testhost_core::{A2dpRole, Address, DeviceRecord, DiscoveredDevice};

use crate::error::{BluezError, Result};

/// A2DP Source UUID (the remote device sends audio to us).
pub const A2DP_SOURCE_UUID: &str = "0000110a-0000-1000-8000-00805f9b34fb";

/// A2DP Sink UUID (the remote device receives audio from us).
pub const A2DP_SINK_UUID: &str = "0000110b-0000-1000-8000-00805f9b34fb";

/// Parse a coordinator address into a bluer address.
pub fn to_bluer_address(address: &Address) -> Result<bluer::Address> {
    address
        .0
        .parse()
        .map_err(|_| BluezError::DeviceNotFound(address.0.clone()))
}

pub fn from_bluer_address(address: bluer::Address) -> Address {
    Address::new(address.to_string())
}

/// BlueALSA PCM name for A2DP playback to `address`.
pub fn bluealsa_pcm(address: &Address) -> String {
    format!("bluealsa:DEV={},PROFILE=a2dp", address)
}

/// Role the remote device plays, judged from its advertised UUIDs.
///
/// A device advertising both is treated as a sink.
pub fn a2dp_role(uuids: &HashSet<String>) -> A2dpRole {
    if uuids.contains(A2DP_SINK_UUID) {
        A2dpRole::Sink
    } else if uuids.contains(A2DP_SOURCE_UUID) {
        A2dpRole::Source
    } else {
        A2dpRole::None
    }
}

/// Lower-cased service UUIDs advertised by `device`.
pub async fn device_uuids(device: &Device) -> HashSet<String> {
    device
        .uuids()
        .await
        .ok()
        .flatten()
        .map(|uuids| {
            uuids
                .into_iter()
                .map(|u| u.to_string().to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Build a record from live device properties, defaulting what is unavailable.
pub async fn device_record(device: &Device, adapter_name: &str) -> DeviceRecord {
    let address = from_bluer_address(device.address());
    let alias = device
        .alias()
        .await
        .ok()
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| address.to_string());

    DeviceRecord {
        path: address.to_device_path(adapter_name),
        alias,
        paired: device.is_paired().await.unwrap_or(false),
        connected: device.is_connected().await.unwrap_or(false),
        a2dp_role: a2dp_role(&device_uuids(device).await),
        discovered: false,
        address,
    }
}

pub async fn discovered_device(device: &Device, adapter_name: &str) -> DiscoveredDevice {
    let record = device_record(device, adapter_name).await;
    DiscoveredDevice {
        address: record.address,
        alias: record.alias,
        path: record.path,
    }
}
