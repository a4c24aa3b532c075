use core::fmt::Write;

use heapless::{String, Vec};

use super::{AddressType, BleAddress, BleConnection};
use crate::config::{
    ConfigStore, KEY_LEN, MAX_BLE_DEVICES, load_i32, load_str, remove_field, save_i32, save_str,
};
use crate::error::BleError;

/// Known remote dimmers, by name and by learned address
#[derive(Debug, Clone, Default)]
pub struct BleDeviceRegistry {
    devices: Vec<BleConnection, MAX_BLE_DEVICES>,
}

impl BleDeviceRegistry {
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Register `name`; registering a known name is a no-op.
    ///
    /// Returns true if the device is new.
    pub fn add(&mut self, name: &str) -> Result<bool, BleError> {
        if self.get(name).is_some() {
            return Ok(false);
        }
        self.devices
            .push(BleConnection::new(name))
            .map_err(|_| BleError::RegistryFull)?;
        Ok(true)
    }

    pub fn remove(&mut self, name: &str) -> Option<BleConnection> {
        let index = self.devices.iter().position(|d| d.name() == name)?;
        Some(self.devices.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&BleConnection> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BleConnection> {
        self.devices.iter_mut().find(|d| d.name() == name)
    }

    pub fn find_by_address(&mut self, address: &BleAddress) -> Option<&mut BleConnection> {
        self.devices
            .iter_mut()
            .find(|d| d.address() == Some(address))
    }

    /// True if some device still lacks a valid address
    pub fn any_unresolved(&self) -> bool {
        self.devices.iter().any(|d| !d.is_available())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BleConnection> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BleConnection> {
        self.devices.iter_mut()
    }

    /// Store the device list under `prefix`
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn save<S: ConfigStore + ?Sized>(&self, store: &mut S, prefix: &str) {
        save_i32(store, prefix, "n_device", self.devices.len() as i32);
        for (i, device) in self.devices.iter().enumerate() {
            let Some(key) = device_key(prefix, i) else {
                continue;
            };
            save_str(store, &key, "name", device.name());
            match device.address() {
                Some(address) => {
                    save_str(store, &key, "address", &address.to_text());
                    save_i32(store, &key, "addressType", address.kind.as_i32());
                }
                None => remove_field(store, &key, "address"),
            }
        }
    }

    /// Replace the device list with the one stored under `prefix`
    #[allow(clippy::cast_sign_loss)]
    pub fn load<S: ConfigStore + ?Sized>(&mut self, store: &S, prefix: &str) {
        self.devices.clear();
        let count = load_i32(store, prefix, "n_device", 0).max(0) as usize;
        for i in 0..count.min(MAX_BLE_DEVICES) {
            let Some(key) = device_key(prefix, i) else {
                continue;
            };
            let Some(name) = load_str(store, &key, "name") else {
                continue;
            };
            if name.is_empty() || self.add(&name).is_err() {
                continue;
            }
            let kind = AddressType::from_i32(load_i32(store, &key, "addressType", 0));
            let address = load_str(store, &key, "address")
                .and_then(|text| BleAddress::parse(&text, kind));
            if let (Some(address), Some(device)) = (address, self.get_mut(&name)) {
                device.set_address(address);
            }
        }
    }
}

fn device_key(prefix: &str, index: usize) -> Option<String<KEY_LEN>> {
    let mut key = String::new();
    write!(key, "{prefix}.device{index}").ok().map(|()| key)
}
