use heapless::{String, Vec};

#[cfg(feature = "esp32-log")]
use esp_println::println;

use super::{Advertisement, BleAddress, BleRadio, DeviceName, Uuid, device_name};
use crate::config::MAX_VALUE_LEN;
use crate::error::{BleError, Error, GattError};

/// Receives the value of a subscribed characteristic
pub type NotificationHandler = fn(&BleAddress, &[u8]);

#[derive(Debug, Clone, Copy)]
struct Subscriber {
    characteristic: Uuid,
    handler: NotificationHandler,
}

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No address known yet
    Unbound,
    /// Address known, not connected
    Available,
    Connected,
}

/// A known remote device and its transient GATT link.
///
/// Connecting goes through [`super::BleClient::connect`], which refuses
/// while a scan is active.
#[derive(Debug, Clone)]
pub struct BleConnection {
    name: DeviceName,
    address: Option<BleAddress>,
    subscriber: Option<Subscriber>,
}

impl BleConnection {
    pub fn new(name: &str) -> Self {
        Self {
            name: device_name(name),
            address: None,
            subscriber: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address, if valid
    pub const fn address(&self) -> Option<&BleAddress> {
        self.address.as_ref()
    }

    pub const fn is_available(&self) -> bool {
        self.address.is_some()
    }

    pub fn is_connected<R: BleRadio>(&self, radio: &R) -> bool {
        self.address.as_ref().is_some_and(|a| radio.is_connected(a))
    }

    pub fn state<R: BleRadio>(&self, radio: &R) -> ConnectionState {
        match &self.address {
            None => ConnectionState::Unbound,
            Some(a) if radio.is_connected(a) => ConnectionState::Connected,
            Some(_) => ConnectionState::Available,
        }
    }

    /// Learn an address from the persistent config
    pub(crate) fn set_address(&mut self, address: BleAddress) {
        self.address = Some(address);
    }

    /// Record the address of an advertisement for this device.
    ///
    /// Returns true if the address changed; a link to the stale address is
    /// closed first.
    pub(crate) fn received_advertisement<R: BleRadio>(&mut self, adv: &Advertisement, radio: &mut R) -> bool {
        if self.address.as_ref() == Some(&adv.address) {
            return false;
        }
        self.disconnect(radio);
        self.address = Some(adv.address);
        true
    }

    /// Forget the address, the device has to be found again
    pub(crate) fn clear_device<R: BleRadio>(&mut self, radio: &mut R) {
        self.disconnect(radio);
        self.address = None;
    }

    pub(crate) fn connect<R: BleRadio>(&mut self, radio: &mut R) -> Result<(), BleError> {
        let Some(address) = self.address else {
            return Err(BleError::AddressUnknown);
        };
        if radio.is_connected(&address) {
            return Ok(());
        }
        if let Err(e) = radio.connect(&address) {
            #[cfg(feature = "esp32-log")]
            println!("[ble] connect to {} ({}) failed", self.name, address);
            self.clear_device(radio);
            return Err(e);
        }
        Ok(())
    }

    /// Close the link. Idempotent.
    pub fn disconnect<R: BleRadio>(&mut self, radio: &mut R) {
        if let Some(address) = &self.address {
            if radio.is_connected(address) {
                radio.disconnect(address);
            }
        }
    }

    pub(crate) fn notify(&self, characteristic: &Uuid, value: &[u8]) {
        if let (Some(sub), Some(address)) = (&self.subscriber, &self.address) {
            if &sub.characteristic == characteristic {
                (sub.handler)(address, value);
            }
        }
    }
}

/// A connected [`BleConnection`] together with the radio it talks over
pub struct Link<'c, R: BleRadio> {
    pub(crate) conn: &'c mut BleConnection,
    pub(crate) radio: &'c mut R,
}

impl<R: BleRadio> Link<'_, R> {
    pub fn name(&self) -> &str {
        self.conn.name()
    }

    fn address(&self) -> Result<BleAddress, Error> {
        match self.conn.address {
            Some(a) if self.radio.is_connected(&a) => Ok(a),
            _ => Err(BleError::NotConnected.into()),
        }
    }

    pub fn set(&mut self, service: &Uuid, characteristic: &Uuid, data: &[u8]) -> Result<(), Error> {
        let address = self.address()?;
        let props = self
            .radio
            .properties(&address, service, characteristic)
            .ok_or(GattError::NotFound)?;
        if !props.write {
            return Err(GattError::NotWritable.into());
        }
        self.radio.write(&address, service, characteristic, data)?;
        Ok(())
    }

    pub fn set_u8(&mut self, service: &Uuid, characteristic: &Uuid, value: u8) -> Result<(), Error> {
        self.set(service, characteristic, &[value])
    }

    pub fn set_u16(&mut self, service: &Uuid, characteristic: &Uuid, value: u16) -> Result<(), Error> {
        self.set(service, characteristic, &value.to_le_bytes())
    }

    pub fn set_u32(&mut self, service: &Uuid, characteristic: &Uuid, value: u32) -> Result<(), Error> {
        self.set(service, characteristic, &value.to_le_bytes())
    }

    pub fn set_str(&mut self, service: &Uuid, characteristic: &Uuid, value: &str) -> Result<(), Error> {
        self.set(service, characteristic, value.as_bytes())
    }

    /// Read a characteristic into a buffer
    pub fn get(&mut self, service: &Uuid, characteristic: &Uuid) -> Result<Vec<u8, MAX_VALUE_LEN>, Error> {
        let address = self.address()?;
        let props = self
            .radio
            .properties(&address, service, characteristic)
            .ok_or(GattError::NotFound)?;
        if !props.read {
            return Err(GattError::NotReadable.into());
        }
        let mut buf = [0u8; MAX_VALUE_LEN];
        let len = self.radio.read(&address, service, characteristic, &mut buf)?;
        let mut value = Vec::new();
        value
            .extend_from_slice(&buf[..len.min(MAX_VALUE_LEN)])
            .map_err(|()| GattError::SizeMismatch)?;
        Ok(value)
    }

    fn get_exact<const N: usize>(&mut self, service: &Uuid, characteristic: &Uuid) -> Result<[u8; N], Error> {
        let value = self.get(service, characteristic)?;
        value
            .as_slice()
            .try_into()
            .map_err(|_| GattError::SizeMismatch.into())
    }

    pub fn get_u8(&mut self, service: &Uuid, characteristic: &Uuid) -> Result<u8, Error> {
        self.get_exact::<1>(service, characteristic).map(|b| b[0])
    }

    pub fn get_u16(&mut self, service: &Uuid, characteristic: &Uuid) -> Result<u16, Error> {
        self.get_exact::<2>(service, characteristic).map(u16::from_le_bytes)
    }

    pub fn get_u32(&mut self, service: &Uuid, characteristic: &Uuid) -> Result<u32, Error> {
        self.get_exact::<4>(service, characteristic).map(u32::from_le_bytes)
    }

    pub fn get_string(&mut self, service: &Uuid, characteristic: &Uuid) -> Result<String<MAX_VALUE_LEN>, Error> {
        let value = self.get(service, characteristic)?;
        let text = core::str::from_utf8(&value).map_err(|_| GattError::SizeMismatch)?;
        let mut s = String::new();
        let _ = s.push_str(text);
        Ok(s)
    }

    /// Register the single notification subscriber of this connection.
    pub fn subscribe(&mut self, service: &Uuid, characteristic: &Uuid, handler: NotificationHandler) -> Result<(), Error> {
        if self.conn.subscriber.is_some() {
            return Err(BleError::AlreadySubscribed.into());
        }
        let address = self.address()?;
        let props = self
            .radio
            .properties(&address, service, characteristic)
            .ok_or(GattError::NotFound)?;
        if !props.notify {
            return Err(GattError::NotNotifiable.into());
        }
        self.radio.subscribe(&address, service, characteristic)?;
        self.conn.subscriber = Some(Subscriber {
            characteristic: *characteristic,
            handler,
        });
        Ok(())
    }

    pub fn unsubscribe(&mut self) {
        self.conn.subscriber = None;
    }
}
