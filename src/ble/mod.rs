//! BLE central role: discovering remote dimmers and talking to them.
//!
//! [`BleClient`] is the single owner of the radio. It runs the scan session,
//! resolves advertisements against the [`BleDeviceRegistry`] and is the only
//! path through which a [`BleConnection`] can be opened, so a connect can
//! never be issued while a scan is running.

mod adv;
mod client;
mod connection;
pub mod protocol;
mod registry;

use core::fmt::{self, Write};

use embassy_time::Duration;
use heapless::{String, Vec};

use crate::channel::{Channel, Receiver, Sender};
use crate::config::{MAX_VALUE_LEN, NAME_LEN};
use crate::error::{BleError, GattError};

pub use adv::{Advertisement, MAX_ADV_SERVICES, MAX_MANUFACTURER_DATA};
pub use client::{BleClient, BleHost, ClientEvent, ScanFilters, ScanState};
pub use connection::{BleConnection, ConnectionState, Link, NotificationHandler};
pub use registry::BleDeviceRegistry;

/// Capacity of the radio event queue.
pub const RADIO_QUEUE: usize = 16;

pub type RadioChannel = Channel<RadioEvent, RADIO_QUEUE>;
pub type RadioSender<'a> = Sender<'a, RadioEvent, RADIO_QUEUE>;
pub type RadioReceiver<'a> = Receiver<'a, RadioEvent, RADIO_QUEUE>;

/// A device name as advertised
pub type DeviceName = String<NAME_LEN>;

/// Copy `name` into a [`DeviceName`], truncating at a character boundary
pub fn device_name(name: &str) -> DeviceName {
    let mut n = DeviceName::new();
    for c in name.chars() {
        if n.push(c).is_err() {
            break;
        }
    }
    n
}

/// Kind of a BLE device address
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    #[default]
    Public,
    Random,
}

impl AddressType {
    pub const fn as_i32(self) -> i32 {
        match self {
            AddressType::Public => 0,
            AddressType::Random => 1,
        }
    }

    pub const fn from_i32(value: i32) -> Self {
        match value {
            1 => AddressType::Random,
            _ => AddressType::Public,
        }
    }
}

/// 48-bit device address, most significant byte first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BleAddress {
    pub bytes: [u8; 6],
    pub kind: AddressType,
}

impl BleAddress {
    pub const fn new(bytes: [u8; 6], kind: AddressType) -> Self {
        Self { bytes, kind }
    }

    /// Parse the `aa:bb:cc:dd:ee:ff` form
    pub fn parse(text: &str, kind: AddressType) -> Option<Self> {
        let mut bytes = [0u8; 6];
        let mut parts = text.split(':');
        for byte in &mut bytes {
            let part = parts.next()?;
            if part.len() != 2 {
                return None;
            }
            *byte = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self { bytes, kind })
    }

    /// Text form used in the persistent config
    pub fn to_text(&self) -> String<17> {
        let mut text = String::new();
        let _ = write!(text, "{self}");
        text
    }
}

impl fmt::Display for BleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// 128-bit UUID, bytes in textual (big endian) order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    /// Bluetooth base UUID `00000000-0000-1000-8000-00805F9B34FB`
    const BASE: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    /// Expand a 16-bit SIG UUID
    pub const fn from_u16(short: u16) -> Self {
        Self::from_u128(Self::BASE | ((short as u128) << 96))
    }

    /// Build from the little endian byte order used on air
    pub fn from_le_bytes(bytes: &[u8; 16]) -> Self {
        let mut be = *bytes;
        be.reverse();
        Self(be)
    }

    pub const fn as_u128(&self) -> u128 {
        u128::from_be_bytes(self.0)
    }
}

/// Access rights of a remote characteristic
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CharProps {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

/// Something the radio reports asynchronously.
///
/// Pushed by the radio driver (possibly from interrupt context) and drained
/// by [`BleClient::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    /// An advertisement was received during a scan
    Advertisement(Advertisement),
    /// The scan session ended on its own
    ScanComplete,
    /// A subscribed characteristic changed
    Notification {
        address: BleAddress,
        characteristic: Uuid,
        value: Vec<u8, MAX_VALUE_LEN>,
    },
}

/// Radio operations needed by the central role.
///
/// Calls must not block for long: `connect` returns once the link is up or
/// has failed, scan results arrive later as [`RadioEvent`]s.
pub trait BleRadio {
    fn start_scan(&mut self, duration: Duration) -> Result<(), BleError>;
    fn stop_scan(&mut self);

    fn connect(&mut self, address: &BleAddress) -> Result<(), BleError>;
    fn disconnect(&mut self, address: &BleAddress);
    fn is_connected(&self, address: &BleAddress) -> bool;

    /// Rights of a characteristic, `None` if the service or characteristic
    /// is absent
    fn properties(&mut self, address: &BleAddress, service: &Uuid, characteristic: &Uuid) -> Option<CharProps>;
    fn write(&mut self, address: &BleAddress, service: &Uuid, characteristic: &Uuid, data: &[u8]) -> Result<(), GattError>;
    fn read(&mut self, address: &BleAddress, service: &Uuid, characteristic: &Uuid, buf: &mut [u8]) -> Result<usize, GattError>;
    fn subscribe(&mut self, address: &BleAddress, service: &Uuid, characteristic: &Uuid) -> Result<(), GattError>;
}
