use heapless::Vec;

use super::{BleAddress, DeviceName, Uuid, device_name};

/// Service UUIDs kept per advertisement.
pub const MAX_ADV_SERVICES: usize = 4;

/// Manufacturer data bytes kept per advertisement.
pub const MAX_MANUFACTURER_DATA: usize = 16;

const AD_INCOMPLETE_16: u8 = 0x02;
const AD_COMPLETE_16: u8 = 0x03;
const AD_INCOMPLETE_128: u8 = 0x06;
const AD_COMPLETE_128: u8 = 0x07;
const AD_SHORT_NAME: u8 = 0x08;
const AD_COMPLETE_NAME: u8 = 0x09;
const AD_MANUFACTURER: u8 = 0xFF;

/// A received advertisement, reduced to what device resolution needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: BleAddress,
    pub name: Option<DeviceName>,
    pub services: Vec<Uuid, MAX_ADV_SERVICES>,
    pub manufacturer_data: Vec<u8, MAX_MANUFACTURER_DATA>,
}

impl Advertisement {
    /// Advertisement carrying only an address
    pub fn new(address: BleAddress) -> Self {
        Self {
            address,
            name: None,
            services: Vec::new(),
            manufacturer_data: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(device_name(name));
        self
    }

    #[must_use]
    pub fn with_service(mut self, uuid: Uuid) -> Self {
        let _ = self.services.push(uuid);
        self
    }

    #[must_use]
    pub fn with_manufacturer_data(mut self, data: &[u8]) -> Self {
        self.manufacturer_data.clear();
        let len = data.len().min(MAX_MANUFACTURER_DATA);
        let _ = self.manufacturer_data.extend_from_slice(&data[..len]);
        self
    }

    /// Parse raw advertising data (a sequence of length/type/value
    /// structures).
    ///
    /// Malformed trailing structures are ignored. A complete name wins over
    /// a shortened one.
    pub fn parse(address: BleAddress, data: &[u8]) -> Self {
        let mut adv = Self::new(address);
        let mut i = 0;
        while i < data.len() {
            let len = data[i] as usize;
            if len == 0 || i + 1 + len > data.len() {
                break;
            }
            let ad_type = data[i + 1];
            let value = &data[i + 2..i + 1 + len];
            match ad_type {
                AD_INCOMPLETE_16 | AD_COMPLETE_16 => {
                    for chunk in value.chunks_exact(2) {
                        let short = u16::from_le_bytes([chunk[0], chunk[1]]);
                        let _ = adv.services.push(Uuid::from_u16(short));
                    }
                }
                AD_INCOMPLETE_128 | AD_COMPLETE_128 => {
                    for chunk in value.chunks_exact(16) {
                        let mut bytes = [0u8; 16];
                        bytes.copy_from_slice(chunk);
                        let _ = adv.services.push(Uuid::from_le_bytes(&bytes));
                    }
                }
                AD_SHORT_NAME | AD_COMPLETE_NAME => {
                    if ad_type == AD_COMPLETE_NAME || adv.name.is_none() {
                        if let Ok(text) = core::str::from_utf8(value) {
                            adv = adv.with_name(text);
                        }
                    }
                }
                AD_MANUFACTURER => {
                    adv = adv.with_manufacturer_data(value);
                }
                _ => {}
            }
            i += len + 1;
        }
        adv
    }

    pub fn advertises_service(&self, uuid: &Uuid) -> bool {
        self.services.iter().any(|s| s == uuid)
    }

    /// Company identifier from the first two manufacturer data bytes
    pub fn manufacturer_id(&self) -> Option<u16> {
        match self.manufacturer_data.as_slice() {
            [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}
