//! Error types shared across the crate.
//!
//! Every variant carries only fixed-size data so errors stay `Copy` and
//! usable without an allocator.

use core::fmt;

/// Top-level error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A BLE client or connection operation failed.
    Ble(BleError),
    /// A GATT characteristic access failed.
    Gatt(GattError),
    /// The LED strip could not be driven.
    Strip(StripError),
    /// A fixed-capacity container is full.
    CapacityExceeded,
    /// No dimmer answers to that identifier.
    UnknownDimmer,
    /// The collection was built without a dimmer factory.
    FixedCollection,
}

/// Failures of the BLE central role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleError {
    /// The device has no valid address yet.
    AddressUnknown,
    /// No device with that name is registered.
    UnknownDevice,
    /// The radio is scanning, so connections are refused.
    ScanActive,
    /// The GATT connect attempt failed.
    ConnectFailed,
    /// The link is not connected.
    NotConnected,
    /// A notification subscriber is already registered for this connection.
    AlreadySubscribed,
    /// The device registry is full.
    RegistryFull,
}

/// Failures of a single characteristic read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattError {
    /// The service or characteristic does not exist on the peer.
    NotFound,
    /// The characteristic lacks the read right.
    NotReadable,
    /// The characteristic lacks the write right.
    NotWritable,
    /// The characteristic cannot notify.
    NotNotifiable,
    /// The value had an unexpected size.
    SizeMismatch,
    /// The transport rejected the operation.
    Transport,
}

/// Failures of the LED strip output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripError {
    /// `count * bpp` does not fit in the pixel buffer.
    BufferTooSmall,
    /// Only 3 and 4 bytes per pixel are supported.
    UnsupportedBpp(u8),
    /// The LED driver rejected the write.
    WriteFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Ble(e) => write!(f, "ble: {e}"),
            Error::Gatt(e) => write!(f, "gatt: {e}"),
            Error::Strip(e) => write!(f, "strip: {e}"),
            Error::CapacityExceeded => f.write_str("capacity exceeded"),
            Error::UnknownDimmer => f.write_str("unknown dimmer"),
            Error::FixedCollection => f.write_str("collection cannot grow"),
        }
    }
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            BleError::AddressUnknown => "device address unknown",
            BleError::UnknownDevice => "device not registered",
            BleError::ScanActive => "scan in progress",
            BleError::ConnectFailed => "connect failed",
            BleError::NotConnected => "not connected",
            BleError::AlreadySubscribed => "already subscribed",
            BleError::RegistryFull => "device registry full",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for GattError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            GattError::NotFound => "characteristic not found",
            GattError::NotReadable => "characteristic not readable",
            GattError::NotWritable => "characteristic not writable",
            GattError::NotNotifiable => "characteristic cannot notify",
            GattError::SizeMismatch => "unexpected value size",
            GattError::Transport => "transport error",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for StripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StripError::BufferTooSmall => f.write_str("pixel buffer too small"),
            StripError::UnsupportedBpp(bpp) => write!(f, "unsupported bytes per pixel: {bpp}"),
            StripError::WriteFailed => f.write_str("led write failed"),
        }
    }
}

impl core::error::Error for Error {}
impl core::error::Error for BleError {}
impl core::error::Error for GattError {}
impl core::error::Error for StripError {}

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}

impl From<GattError> for Error {
    fn from(e: GattError) -> Self {
        Error::Gatt(e)
    }
}

impl From<StripError> for Error {
    fn from(e: StripError) -> Self {
        Error::Strip(e)
    }
}
