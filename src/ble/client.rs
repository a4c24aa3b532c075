//! Scan session management and advertisement resolution.
//!
//! The client scans whenever a registered device has no valid address yet,
//! or when discovery of unassigned devices was requested. Scanning and
//! connecting are mutually exclusive on the radio: starting a scan closes
//! every link, and [`BleClient::connect`] refuses while a scan runs.

use embassy_time::{Duration, Instant};
use heapless::{Deque, Vec};

#[cfg(feature = "esp32-log")]
use esp_println::println;

use super::{
    Advertisement, BleAddress, BleConnection, BleDeviceRegistry, BleRadio, ConnectionState,
    DeviceName, Link, RadioEvent, RadioReceiver, Uuid,
};
use crate::config::{
    ConfigStore, MAX_KEEP_OPEN, MAX_UNKNOWN_DEVICES, MAX_VALUE_LEN, PAUSE_BETWEEN_SCANS,
    SCAN_DURATION, SCAN_STOP_SLEEP, SCAN_UNKNOWN_DURATION, SCAN_UNKNOWN_SLEEP,
};
use crate::error::{BleError, Error};
use crate::sleep::SleepControl;

/// Capacity of the outgoing client event queue.
pub const CLIENT_EVENT_QUEUE: usize = 8;

/// Scan session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    /// Scanning until the deadline or an earlier completion report
    Scanning { until: Instant },
}

/// Filters applied to advertisements of unregistered devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanFilters {
    /// Only report devices advertising this service
    pub service: Option<Uuid>,
    /// Only report devices with this company identifier
    pub manufacturer: Option<u16>,
    /// Report each unassigned name once
    pub no_duplicate_names: bool,
}

/// Something the client reports to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// An unregistered device passed the discovery filters
    UnknownDeviceFound { name: DeviceName, address: BleAddress },
    /// A registered device got a new address
    DeviceResolved { name: DeviceName },
}

/// Owner of the radio and of every known device.
pub struct BleClient<'a, R: BleRadio> {
    radio: R,
    radio_events: RadioReceiver<'a>,
    registry: BleDeviceRegistry,
    state: ScanState,
    filters: ScanFilters,

    scan_unknown: bool,
    scan_unknown_until: Option<Instant>,
    should_update_scan: bool,
    update_scan_not_before: Option<Instant>,
    disconnect_for_scan: bool,

    unknown_devices: Vec<DeviceName, MAX_UNKNOWN_DEVICES>,
    events: Deque<ClientEvent, CLIENT_EVENT_QUEUE>,
    dirty: bool,
}

impl<'a, R: BleRadio> BleClient<'a, R> {
    /// Create a new client driving `radio`, fed by `radio_events`
    pub fn new(radio: R, radio_events: RadioReceiver<'a>) -> Self {
        Self {
            radio,
            radio_events,
            registry: BleDeviceRegistry::new(),
            state: ScanState::Idle,
            filters: ScanFilters::default(),
            scan_unknown: false,
            scan_unknown_until: None,
            should_update_scan: false,
            update_scan_not_before: None,
            disconnect_for_scan: false,
            unknown_devices: Vec::new(),
            events: Deque::new(),
            dirty: false,
        }
    }

    pub const fn state(&self) -> ScanState {
        self.state
    }

    pub const fn is_scanning(&self) -> bool {
        matches!(self.state, ScanState::Scanning { .. })
    }

    /// Connections are only allowed while no scan session is active
    pub const fn can_connect(&self) -> bool {
        !self.is_scanning()
    }

    pub fn registry(&self) -> &BleDeviceRegistry {
        &self.registry
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Upper bound for how long a dimmer may keep an idle link open
    pub const fn max_keep_open(&self) -> Duration {
        MAX_KEEP_OPEN
    }

    // Device management

    /// Register a device by name. Registering a known name is a no-op.
    pub fn add_device(&mut self, name: &str) -> Result<(), BleError> {
        if self.registry.add(name)? {
            self.dirty = true;
        }
        self.should_update_scan = true;
        self.update_scan_not_before = None;
        self.disconnect_for_scan = false;
        Ok(())
    }

    /// Forget a device, closing its link
    pub fn del_device(&mut self, name: &str) {
        if let Some(mut device) = self.registry.remove(name) {
            device.disconnect(&mut self.radio);
            self.dirty = true;
        }
        self.should_update_scan = true;
    }

    pub fn device(&self, name: &str) -> Option<&BleConnection> {
        self.registry.get(name)
    }

    pub fn device_state(&self, name: &str) -> Option<ConnectionState> {
        self.registry.get(name).map(|d| d.state(&self.radio))
    }

    pub fn address(&self, name: &str) -> Option<BleAddress> {
        self.registry.get(name).and_then(|d| d.address().copied())
    }

    /// Seed a device's address, typically from the persistent config
    pub fn set_address(&mut self, name: &str, address: BleAddress) {
        if let Some(device) = self.registry.get_mut(name) {
            device.set_address(address);
            self.should_update_scan = true;
        }
    }

    /// A connect to `name` failed: forget its address and look for it again
    pub fn device_not_seen(&mut self, name: &str) {
        if let Some(device) = self.registry.get_mut(name) {
            device.clear_device(&mut self.radio);
        }
        self.should_update_scan = true;
    }

    // Connections

    /// Open the link to `name`.
    ///
    /// This is the only way to connect, and it refuses while scanning.
    pub fn connect(&mut self, name: &str) -> Result<(), BleError> {
        if !self.can_connect() {
            return Err(BleError::ScanActive);
        }
        let device = self.registry.get_mut(name).ok_or(BleError::UnknownDevice)?;
        device.connect(&mut self.radio)
    }

    pub fn disconnect(&mut self, name: &str) {
        if let Some(device) = self.registry.get_mut(name) {
            device.disconnect(&mut self.radio);
        }
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .is_some_and(|d| d.is_connected(&self.radio))
    }

    /// Characteristic access to a connected device
    pub fn link(&mut self, name: &str) -> Result<Link<'_, R>, BleError> {
        let conn = self.registry.get_mut(name).ok_or(BleError::UnknownDevice)?;
        if !conn.is_connected(&self.radio) {
            return Err(BleError::NotConnected);
        }
        Ok(Link {
            conn,
            radio: &mut self.radio,
        })
    }

    // Discovery

    pub fn set_service_filter(&mut self, service: Uuid) {
        self.filters.service = Some(service);
    }

    pub fn set_manufacturer_filter(&mut self, manufacturer: u16) {
        self.filters.manufacturer = Some(manufacturer);
    }

    pub fn set_duplicate_name_filter(&mut self, no_duplicates: bool) {
        self.filters.no_duplicate_names = no_duplicates;
    }

    pub const fn filters(&self) -> &ScanFilters {
        &self.filters
    }

    /// Turn discovery of unregistered devices on or off
    pub fn find_unknown_devices(&mut self, on: bool) {
        self.scan_unknown = on;
        self.should_update_scan = true;
        self.update_scan_not_before = None;
        self.disconnect_for_scan = true;
    }

    /// Look for unregistered devices for a while
    pub fn start_scan_unknown(&mut self, now: Instant, sleep: &mut dyn SleepControl) {
        self.find_unknown_devices(true);
        self.scan_unknown_until = Some(now + SCAN_UNKNOWN_DURATION);
        sleep.postpone_sleep(SCAN_UNKNOWN_SLEEP);
    }

    /// Names of unregistered devices seen during discovery
    pub fn unknown_devices(&self) -> &[DeviceName] {
        &self.unknown_devices
    }

    /// Next event for the application
    pub fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    // Persistence

    /// True if devices were added or removed since the last save
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn save<S: ConfigStore + ?Sized>(&mut self, store: &mut S, prefix: &str) {
        self.registry.save(store, prefix);
        self.dirty = false;
    }

    pub fn load<S: ConfigStore + ?Sized>(&mut self, store: &S, prefix: &str) {
        self.registry.load(store, prefix);
        self.dirty = false;
        self.should_update_scan = true;
    }

    // Scheduling

    /// Advance the scan state machine.
    ///
    /// Re-evaluates scanning if something asked for it on an earlier tick,
    /// then drains the radio events; those take effect on the next tick.
    pub fn tick(&mut self, now: Instant, sleep: &mut dyn SleepControl) {
        if let Some(until) = self.scan_unknown_until {
            if now >= until {
                self.find_unknown_devices(false);
                self.scan_unknown_until = None;
            }
        }

        if let ScanState::Scanning { until } = self.state {
            if now >= until {
                self.radio.stop_scan();
                self.scan_finished(now, sleep);
            }
        }

        let due = self.update_scan_not_before.is_none_or(|t| now >= t);
        if self.should_update_scan && due {
            self.should_update_scan = false;
            self.update_scan_not_before = Some(now + PAUSE_BETWEEN_SCANS);
            self.update_scanning(now, sleep);
        }

        while let Ok(event) = self.radio_events.try_receive() {
            match event {
                RadioEvent::Advertisement(adv) => self.on_advertisement(&adv),
                RadioEvent::ScanComplete => {
                    if self.is_scanning() {
                        self.scan_finished(now, sleep);
                    }
                }
                RadioEvent::Notification {
                    address,
                    characteristic,
                    value,
                } => {
                    if let Some(device) = self.registry.find_by_address(&address) {
                        device.notify(&characteristic, &value);
                    }
                }
            }
        }
    }

    /// Stop the running scan on request
    pub fn stop_scan(&mut self, now: Instant, sleep: &mut dyn SleepControl) {
        if self.is_scanning() {
            self.radio.stop_scan();
        }
        self.scan_finished(now, sleep);
    }

    fn should_scan(&self) -> bool {
        self.scan_unknown || self.registry.any_unresolved()
    }

    fn update_scanning(&mut self, now: Instant, sleep: &mut dyn SleepControl) {
        let should_scan = self.should_scan();
        if should_scan && !self.is_scanning() {
            self.start_scanning(now, sleep);
        } else if !should_scan && self.is_scanning() {
            self.radio.stop_scan();
            self.scan_finished(now, sleep);
        }
    }

    fn start_scanning(&mut self, now: Instant, sleep: &mut dyn SleepControl) {
        let any_connected = self.registry.iter().any(|d| d.is_connected(&self.radio));
        if any_connected {
            if !self.disconnect_for_scan {
                // Give open links one grace window, force them closed next time.
                #[cfg(feature = "esp32-log")]
                println!("[ble] scan postponed: active connection");
                self.should_update_scan = true;
                self.update_scan_not_before = Some(now + PAUSE_BETWEEN_SCANS);
                self.disconnect_for_scan = true;
                return;
            }
            for device in self.registry.iter_mut() {
                device.disconnect(&mut self.radio);
            }
        }

        if let Err(_e) = self.radio.start_scan(SCAN_DURATION) {
            #[cfg(feature = "esp32-log")]
            println!("[ble] scan start failed: {}", _e);
            self.should_update_scan = true;
            self.update_scan_not_before = Some(now + PAUSE_BETWEEN_SCANS);
            return;
        }

        #[cfg(feature = "esp32-log")]
        println!("[ble] scan start (unknown: {})", self.scan_unknown);
        self.state = ScanState::Scanning {
            until: now + SCAN_DURATION,
        };
        sleep.pause_sleep();
    }

    /// Leave the scanning state and schedule a re-evaluation after the
    /// grace window
    fn scan_finished(&mut self, now: Instant, sleep: &mut dyn SleepControl) {
        if self.is_scanning() {
            #[cfg(feature = "esp32-log")]
            println!("[ble] scan stop");
            self.state = ScanState::Idle;
            sleep.resume_sleep();
            sleep.postpone_sleep(SCAN_STOP_SLEEP);
        }
        self.should_update_scan = true;
        self.disconnect_for_scan = false;
        self.update_scan_not_before = Some(now + PAUSE_BETWEEN_SCANS);
    }

    fn on_advertisement(&mut self, adv: &Advertisement) {
        let known_name = adv
            .name
            .as_ref()
            .filter(|name| self.registry.get(name).is_some());
        let device = match known_name {
            Some(name) => self.registry.get_mut(name),
            None => self.registry.find_by_address(&adv.address),
        };

        if let Some(device) = device {
            if device.received_advertisement(adv, &mut self.radio) {
                #[cfg(feature = "esp32-log")]
                println!("[ble] {} is at {}", device.name(), adv.address);
                let name = super::device_name(device.name());
                self.push_event(ClientEvent::DeviceResolved { name });
            }
            self.should_update_scan = true;
            self.update_scan_not_before = None;
            return;
        }

        if self.scan_unknown {
            self.on_unknown_advertisement(adv);
        }
    }

    fn on_unknown_advertisement(&mut self, adv: &Advertisement) {
        let Some(name) = adv.name.as_ref().filter(|n| !n.is_empty()) else {
            return;
        };
        let seen = self.unknown_devices.iter().any(|n| n == name);
        if self.filters.no_duplicate_names && seen {
            return;
        }
        if let Some(service) = &self.filters.service {
            if !adv.advertises_service(service) {
                return;
            }
        }
        if let Some(manufacturer) = self.filters.manufacturer {
            if adv.manufacturer_id() != Some(manufacturer) {
                return;
            }
        }

        if !seen && self.unknown_devices.push(name.clone()).is_err() {
            #[cfg(feature = "esp32-log")]
            println!("[ble] unknown device list full, not keeping {}", name);
        }
        self.push_event(ClientEvent::UnknownDeviceFound {
            name: name.clone(),
            address: adv.address,
        });
    }

    fn push_event(&mut self, event: ClientEvent) {
        if self.events.is_full() {
            self.events.pop_front();
        }
        let _ = self.events.push_back(event);
    }
}

/// Object-safe view of the client used by remote dimmers.
///
/// Dimmers never touch the radio directly; everything goes through the
/// client so the scan/connect exclusion holds.
pub trait BleHost {
    fn can_connect(&self) -> bool;
    fn add_device(&mut self, name: &str) -> Result<(), BleError>;
    fn del_device(&mut self, name: &str);
    fn device_state(&self, name: &str) -> Option<ConnectionState>;
    fn address(&self, name: &str) -> Option<BleAddress>;
    fn set_address(&mut self, name: &str, address: BleAddress);
    fn device_not_seen(&mut self, name: &str);
    fn connect(&mut self, name: &str) -> Result<(), BleError>;
    fn disconnect(&mut self, name: &str);
    fn max_keep_open(&self) -> Duration;

    /// Write `data` to a characteristic of the connected device `name`
    fn write(&mut self, name: &str, service: &Uuid, characteristic: &Uuid, data: &[u8]) -> Result<(), Error>;
    /// Read a characteristic of the connected device `name`
    fn read(&mut self, name: &str, service: &Uuid, characteristic: &Uuid) -> Result<Vec<u8, MAX_VALUE_LEN>, Error>;
}

impl<R: BleRadio> BleHost for BleClient<'_, R> {
    fn can_connect(&self) -> bool {
        BleClient::can_connect(self)
    }

    fn add_device(&mut self, name: &str) -> Result<(), BleError> {
        BleClient::add_device(self, name)
    }

    fn del_device(&mut self, name: &str) {
        BleClient::del_device(self, name);
    }

    fn device_state(&self, name: &str) -> Option<ConnectionState> {
        BleClient::device_state(self, name)
    }

    fn address(&self, name: &str) -> Option<BleAddress> {
        BleClient::address(self, name)
    }

    fn set_address(&mut self, name: &str, address: BleAddress) {
        BleClient::set_address(self, name, address);
    }

    fn device_not_seen(&mut self, name: &str) {
        BleClient::device_not_seen(self, name);
    }

    fn connect(&mut self, name: &str) -> Result<(), BleError> {
        BleClient::connect(self, name)
    }

    fn disconnect(&mut self, name: &str) {
        BleClient::disconnect(self, name);
    }

    fn max_keep_open(&self) -> Duration {
        BleClient::max_keep_open(self)
    }

    fn write(&mut self, name: &str, service: &Uuid, characteristic: &Uuid, data: &[u8]) -> Result<(), Error> {
        self.link(name)?.set(service, characteristic, data)
    }

    fn read(&mut self, name: &str, service: &Uuid, characteristic: &Uuid) -> Result<Vec<u8, MAX_VALUE_LEN>, Error> {
        self.link(name)?.get(service, characteristic)
    }
}
