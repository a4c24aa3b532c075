//! Remote dimmer reached over BLE.
//!
//! Changes are not sent right away: [`BleDimmer::update_dimmer`] marks a
//! transmit pending and [`BleDimmer::tick`] works towards it, waiting for
//! the address, for the scan to end and for the link to come up. After a
//! transmit the link stays open for a short while so quick successive
//! changes reuse it.

use embassy_time::{Duration, Instant};

#[cfg(feature = "esp32-log")]
use esp_println::println;

use super::{DimmerContext, DimmerCore, DimmerEvent, DimmerState, RemoteState};
use crate::ble::protocol::{self, BRIGHTNESS, IDENTIFY, IS_ON, SERVICE, TEMPERATURE};
use crate::ble::{AddressType, BleAddress, BleHost, ConnectionState};
use crate::config::{
    BUSY_WARNING_INTERVAL, CONNECT_TIMEOUT, ConfigStore, DEFAULT_KEEP_OPEN, KEEP_OPEN_SLEEP_MARGIN,
    load_str, remove_field, save_i32, save_str,
};

/// Dimmer that forwards its state to a remote device
pub struct BleDimmer {
    core: DimmerCore,
    keep_open: Duration,
    /// Follow changes made on the device itself
    follow_changes: bool,
    /// False while values may not match the device
    data_valid: bool,

    need_transmit: bool,
    need_sync_from_device: bool,
    need_identify: bool,
    /// Give up on the pending transmit after this
    transmit_deadline: Option<Instant>,
    /// Close the idle link after this
    disconnect_at: Option<Instant>,
    /// Rate limit of the "busy" warning
    no_warning_before: Option<Instant>,
}

impl BleDimmer {
    /// Create a new remote dimmer; it has no device until named
    pub fn new(num: u8) -> Self {
        Self {
            core: DimmerCore::new(num).with_temperature(),
            keep_open: DEFAULT_KEEP_OPEN,
            follow_changes: false,
            data_valid: true,
            need_transmit: false,
            need_sync_from_device: false,
            need_identify: false,
            transmit_deadline: None,
            disconnect_at: None,
            no_warning_before: None,
        }
    }

    pub const fn core(&self) -> &DimmerCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut DimmerCore {
        &mut self.core
    }

    pub const fn keep_open(&self) -> Duration {
        self.keep_open
    }

    pub fn set_keep_open(&mut self, keep_open: Duration) {
        self.keep_open = keep_open;
    }

    pub const fn data_valid(&self) -> bool {
        self.data_valid
    }

    /// A transmit is waiting for the device
    pub const fn is_transmit_pending(&self) -> bool {
        self.need_transmit || self.need_sync_from_device
    }

    pub fn is_available(&self, ble: Option<&dyn BleHost>) -> bool {
        ble.and_then(|b| b.device_state(self.core.name()))
            .is_some_and(|s| s != ConnectionState::Unbound)
    }

    /// Rename, moving the registry entry along.
    pub fn set_name(&mut self, name: &str, ble: Option<&mut (dyn BleHost + '_)>) -> bool {
        if self.core.name() == name {
            return false;
        }
        if let Some(ble) = ble {
            if !self.core.name().is_empty() {
                ble.del_device(self.core.name());
            }
            if !name.is_empty() {
                if let Err(_e) = ble.add_device(name) {
                    #[cfg(feature = "esp32-log")]
                    println!("[dimmer{}] cannot register {}: {}", self.core.num(), name, _e);
                }
            }
        }
        self.core.set_name(name)
    }

    /// Follow changes made on the device itself, fetching its state once
    pub fn follow_dimmer_changes(&mut self, follow: bool, now: Instant) {
        self.follow_changes = follow;
        if follow && !self.core.name().is_empty() {
            self.data_valid = false;
            self.need_sync_from_device = true;
            self.transmit_deadline = Some(now + CONNECT_TIMEOUT);
        } else {
            self.data_valid = true;
        }
    }

    /// Fetch the device state again when following its changes
    pub fn refresh(&mut self, now: Instant) {
        if self.follow_changes {
            self.follow_dimmer_changes(true, now);
        }
    }

    pub fn setup(&mut self, ctx: &mut DimmerContext<'_>) {
        if self.follow_changes {
            self.follow_dimmer_changes(true, ctx.now);
        }
    }

    /// Mark a transmit pending; the next ticks carry it out
    pub fn update_dimmer(&mut self, ctx: &mut DimmerContext<'_>) {
        if self.core.name().is_empty() {
            #[cfg(feature = "esp32-log")]
            println!("[dimmer{}] no device configured", self.core.num());
            return;
        }
        self.need_transmit = true;
        self.transmit_deadline = Some(ctx.now + CONNECT_TIMEOUT);
        ctx.events.emit(DimmerEvent::ValueChanged(self.core.num()));
    }

    pub fn identify(&mut self, ctx: &mut DimmerContext<'_>) {
        self.need_identify = true;
        self.update_dimmer(ctx);
    }

    pub fn tick(&mut self, ctx: &mut DimmerContext<'_>) {
        let now = ctx.now;
        let num = self.core.num();
        let Some(ble) = ctx.ble.as_deref_mut() else {
            if self.is_transmit_pending() && self.transmit_expired(now) {
                #[cfg(feature = "esp32-log")]
                println!("[dimmer{}] no ble client, giving up", num);
                self.abandon();
                ctx.events.emit(DimmerEvent::TransmitAbandoned(num));
            }
            return;
        };

        if !self.is_transmit_pending() {
            if self.disconnect_at.is_some_and(|at| now >= at) {
                self.disconnect_at = None;
                ble.disconnect(self.core.name());
                ctx.events.emit(DimmerEvent::AvailableChanged(num));
            }
            return;
        }

        match ble.device_state(self.core.name()) {
            None => {
                #[cfg(feature = "esp32-log")]
                println!("[dimmer{}] skip transmit: no such device", num);
                self.abandon();
                return;
            }
            Some(ConnectionState::Unbound) => {
                if self.transmit_expired(now) {
                    #[cfg(feature = "esp32-log")]
                    println!("[dimmer{}] device not found, giving up", num);
                    self.abandon();
                    ctx.events.emit(DimmerEvent::TransmitAbandoned(num));
                }
                return;
            }
            Some(ConnectionState::Available) => {
                if !ble.can_connect() {
                    if self.no_warning_before.is_none_or(|at| now >= at) {
                        #[cfg(feature = "esp32-log")]
                        println!("[dimmer{}] ble busy, transmit postponed", num);
                        self.no_warning_before = Some(now + BUSY_WARNING_INTERVAL);
                    }
                    return;
                }
                self.no_warning_before = None;
                if let Err(_e) = ble.connect(self.core.name()) {
                    #[cfg(feature = "esp32-log")]
                    println!("[dimmer{}] connect failed: {}", num, _e);
                    ble.device_not_seen(self.core.name());
                }
                // Either way the device came or went; values move next tick.
                ctx.events.emit(DimmerEvent::AvailableChanged(num));
                return;
            }
            Some(ConnectionState::Connected) => {}
        }

        if self.need_sync_from_device {
            self.need_sync_from_device = false;
            if self.sync_from_device(ble) {
                ctx.events.emit(DimmerEvent::ValueChanged(num));
            }
        }
        if self.need_transmit {
            self.need_transmit = false;
            self.transmit(ble);
        }
        self.transmit_deadline = None;

        let keep_open = self.keep_open.min(ble.max_keep_open());
        self.disconnect_at = Some(now + keep_open);
        ctx.sleep.postpone_sleep(keep_open + KEEP_OPEN_SLEEP_MARGIN);
    }

    fn transmit_expired(&self, now: Instant) -> bool {
        self.transmit_deadline.is_none_or(|at| now >= at)
    }

    fn abandon(&mut self) {
        self.need_transmit = false;
        self.need_sync_from_device = false;
        self.need_identify = false;
        self.transmit_deadline = None;
    }

    /// Write brightness, temperature, on/off and identify, in that order
    fn transmit(&mut self, ble: &mut dyn BleHost) {
        let name = self.core.name();
        let brightness = protocol::encode_brightness(self.core.level());
        let ok = ble
            .write(name, &SERVICE, &BRIGHTNESS, &brightness.to_le_bytes())
            .is_ok();
        self.data_valid = ok;

        if let Some(temperature) = self.core.temperature() {
            let value = protocol::encode_temperature(temperature);
            if let Err(_e) = ble.write(name, &SERVICE, &TEMPERATURE, &value.to_le_bytes()) {
                #[cfg(feature = "esp32-log")]
                println!("[dimmer{}] temperature write failed: {}", self.core.num(), _e);
            }
        }

        let is_on = u8::from(self.core.is_on());
        if let Err(_e) = ble.write(name, &SERVICE, &IS_ON, &[is_on]) {
            #[cfg(feature = "esp32-log")]
            println!("[dimmer{}] isOn write failed: {}", self.core.num(), _e);
        }

        if self.need_identify {
            self.need_identify = false;
            let _ = ble.write(name, &SERVICE, &IDENTIFY, &[1]);
        }
    }

    /// Take over the state of the device, returns true if anything changed.
    ///
    /// The data only counts as valid once both brightness and on/off were
    /// read.
    fn sync_from_device(&mut self, ble: &mut dyn BleHost) -> bool {
        let mut changed = false;
        let mut level_read = false;
        let mut on_read = false;

        match ble.read(self.core.name(), &SERVICE, &BRIGHTNESS) {
            Ok(value) => {
                if let Ok(raw) = <[u8; 2]>::try_from(value.as_slice()) {
                    let level = protocol::decode_brightness(u16::from_le_bytes(raw));
                    changed |= self.core.set_level(level);
                    level_read = true;
                }
            }
            Err(_e) => {
                #[cfg(feature = "esp32-log")]
                println!("[dimmer{}] brightness read failed: {}", self.core.num(), _e);
            }
        }

        match ble.read(self.core.name(), &SERVICE, &IS_ON) {
            Ok(value) => {
                if let Some(on) = value.first() {
                    changed |= self.core.set_on(*on != 0);
                    on_read = true;
                }
            }
            Err(_e) => {
                #[cfg(feature = "esp32-log")]
                println!("[dimmer{}] isOn read failed: {}", self.core.num(), _e);
            }
        }

        if self.core.temperature().is_some() {
            if let Ok(value) = ble.read(self.core.name(), &SERVICE, &TEMPERATURE) {
                if let Ok(raw) = <[u8; 2]>::try_from(value.as_slice()) {
                    changed |= self.core.set_temperature(f32::from(u16::from_le_bytes(raw)));
                }
            }
        }

        self.data_valid = level_read && on_read;
        changed
    }

    pub fn state(&self, ble: Option<&dyn BleHost>) -> DimmerState {
        let address = ble.and_then(|b| b.address(self.core.name()));
        let mut state = self.core.state(self.is_available(ble));
        state.remote = Some(RemoteState {
            address: address.map(|a| a.to_text()),
            data_valid: self.data_valid,
        });
        state
    }

    /// Load the settings and register the device with its last address
    pub fn load<C: ConfigStore + ?Sized>(&mut self, store: &C, prefix: &str, ble: Option<&mut (dyn BleHost + '_)>) {
        let previous = crate::ble::device_name(self.core.name());
        self.core.load(store, prefix);
        let Some(ble) = ble else {
            return;
        };
        if previous != self.core.name() && !previous.is_empty() {
            ble.del_device(&previous);
        }
        if self.core.name().is_empty() {
            return;
        }
        if let Err(_e) = ble.add_device(self.core.name()) {
            #[cfg(feature = "esp32-log")]
            println!("[dimmer{}] cannot register {}: {}", self.core.num(), self.core.name(), _e);
            return;
        }
        let kind = AddressType::from_i32(crate::config::load_i32(store, prefix, "addressType", 0));
        let address = load_str(store, prefix, "address")
            .and_then(|text| BleAddress::parse(&text, kind));
        if let Some(address) = address {
            ble.set_address(self.core.name(), address);
        }
    }

    pub fn save<C: ConfigStore + ?Sized>(&self, store: &mut C, prefix: &str, ble: Option<&dyn BleHost>) {
        self.core.save(store, prefix);
        match ble.and_then(|b| b.address(self.core.name())) {
            Some(address) => {
                save_str(store, prefix, "address", &address.to_text());
                save_i32(store, prefix, "addressType", address.kind.as_i32());
            }
            None => remove_field(store, prefix, "address"),
        }
    }
}
