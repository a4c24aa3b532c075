#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use dimmer_composer::ble::{BleAddress, BleRadio, CharProps, Uuid};
use dimmer_composer::config::{ConfigStore, NAME_LEN};
use dimmer_composer::{BleError, Duration, GattError, Instant, SleepControl, StripError, StripOutput};

pub fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

// Radio

#[derive(Debug, Default)]
pub struct RadioState {
    pub scanning: bool,
    pub scans_started: usize,
    pub connected: Vec<BleAddress>,
    pub connect_calls: Vec<BleAddress>,
    /// Connects issued while a scan was running
    pub connects_while_scanning: usize,
    pub fail_connect: bool,
    pub characteristics: HashMap<u128, (CharProps, Vec<u8>)>,
    pub writes: Vec<(u128, Vec<u8>)>,
    pub subscriptions: Vec<u128>,
    /// Characteristics whose reads fail
    pub fail_reads: Vec<u128>,
}

/// Radio whose state stays observable after the client takes ownership
#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    pub state: Rc<RefCell<RadioState>>,
}

impl MockRadio {
    pub fn handle(&self) -> Rc<RefCell<RadioState>> {
        Rc::clone(&self.state)
    }

    pub fn add_characteristic(&self, uuid: Uuid, props: CharProps, value: &[u8]) {
        self.state
            .borrow_mut()
            .characteristics
            .insert(uuid.as_u128(), (props, value.to_vec()));
    }
}

impl BleRadio for MockRadio {
    fn start_scan(&mut self, _duration: Duration) -> Result<(), BleError> {
        let mut state = self.state.borrow_mut();
        state.scanning = true;
        state.scans_started += 1;
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.state.borrow_mut().scanning = false;
    }

    fn connect(&mut self, address: &BleAddress) -> Result<(), BleError> {
        let mut state = self.state.borrow_mut();
        state.connect_calls.push(*address);
        if state.scanning {
            state.connects_while_scanning += 1;
        }
        if state.fail_connect {
            return Err(BleError::ConnectFailed);
        }
        state.connected.push(*address);
        Ok(())
    }

    fn disconnect(&mut self, address: &BleAddress) {
        self.state.borrow_mut().connected.retain(|a| a != address);
    }

    fn is_connected(&self, address: &BleAddress) -> bool {
        self.state.borrow().connected.contains(address)
    }

    fn properties(&mut self, _address: &BleAddress, _service: &Uuid, characteristic: &Uuid) -> Option<CharProps> {
        self.state
            .borrow()
            .characteristics
            .get(&characteristic.as_u128())
            .map(|(props, _)| *props)
    }

    fn write(&mut self, _address: &BleAddress, _service: &Uuid, characteristic: &Uuid, data: &[u8]) -> Result<(), GattError> {
        let mut state = self.state.borrow_mut();
        let key = characteristic.as_u128();
        if let Some((_, value)) = state.characteristics.get_mut(&key) {
            *value = data.to_vec();
        }
        state.writes.push((key, data.to_vec()));
        Ok(())
    }

    fn read(&mut self, _address: &BleAddress, _service: &Uuid, characteristic: &Uuid, buf: &mut [u8]) -> Result<usize, GattError> {
        let state = self.state.borrow();
        if state.fail_reads.contains(&characteristic.as_u128()) {
            return Err(GattError::Transport);
        }
        let (_, value) = state
            .characteristics
            .get(&characteristic.as_u128())
            .ok_or(GattError::NotFound)?;
        let len = value.len().min(buf.len());
        buf[..len].copy_from_slice(&value[..len]);
        Ok(len)
    }

    fn subscribe(&mut self, _address: &BleAddress, _service: &Uuid, characteristic: &Uuid) -> Result<(), GattError> {
        self.state
            .borrow_mut()
            .subscriptions
            .push(characteristic.as_u128());
        Ok(())
    }
}

/// Every characteristic of the remote dimmer service, readable and
/// writable
pub fn dimmer_service(radio: &MockRadio) {
    use dimmer_composer::ble::protocol::{BRIGHTNESS, IDENTIFY, IS_ON, TEMPERATURE};
    let rw = CharProps {
        read: true,
        write: true,
        notify: true,
    };
    radio.add_characteristic(BRIGHTNESS, rw, &[0, 0]);
    radio.add_characteristic(TEMPERATURE, rw, &[0, 0]);
    radio.add_characteristic(IS_ON, rw, &[0]);
    radio.add_characteristic(IDENTIFY, CharProps { write: true, ..CharProps::default() }, &[]);
}

pub fn address(last: u8) -> BleAddress {
    BleAddress::new([0xc0, 0xff, 0xee, 0x00, 0x00, last], Default::default())
}

// PWM

#[derive(Debug, Default)]
pub struct MockPwm {
    pub duties: Vec<u16>,
}

impl MockPwm {
    pub fn last(&self) -> Option<u16> {
        self.duties.last().copied()
    }
}

impl embedded_hal::pwm::ErrorType for MockPwm {
    type Error = core::convert::Infallible;
}

impl embedded_hal::pwm::SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duties.push(duty);
        Ok(())
    }
}

// Strip

#[derive(Debug, Default)]
pub struct MockStrip {
    pub frames: Vec<Vec<u8>>,
    pub power: Vec<bool>,
    /// Every call in order: "refresh", "power on" or "power off"
    pub calls: Vec<&'static str>,
}

impl MockStrip {
    pub fn last_frame(&self) -> &[u8] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl StripOutput for MockStrip {
    fn refresh(&mut self, pixels: &[u8], _bpp: usize) -> Result<(), StripError> {
        self.frames.push(pixels.to_vec());
        self.calls.push("refresh");
        Ok(())
    }

    fn set_power(&mut self, on: bool) {
        self.power.push(on);
        self.calls.push(if on { "power on" } else { "power off" });
    }
}

// Sleep

#[derive(Debug, Default)]
pub struct MockSleep {
    pub postponed: Vec<Duration>,
    pub paused: i32,
}

impl SleepControl for MockSleep {
    fn postpone_sleep(&mut self, duration: Duration) {
        self.postponed.push(duration);
    }

    fn pause_sleep(&mut self) {
        self.paused += 1;
    }

    fn resume_sleep(&mut self) {
        self.paused -= 1;
    }
}

// Config

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    F32(f32),
    I32(i32),
    Str(String),
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub values: HashMap<String, Value>,
}

impl ConfigStore for MemoryStore {
    fn get_f32(&self, key: &str) -> Option<f32> {
        match self.values.get(key)? {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        match self.values.get(key)? {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    fn get_str(&self, key: &str) -> Option<heapless::String<NAME_LEN>> {
        match self.values.get(key)? {
            Value::Str(v) => heapless::String::try_from(v.as_str()).ok(),
            _ => None,
        }
    }

    fn put_f32(&mut self, key: &str, value: f32) {
        self.values.insert(key.to_string(), Value::F32(value));
    }

    fn put_i32(&mut self, key: &str, value: i32) {
        self.values.insert(key.to_string(), Value::I32(value));
    }

    fn put_str(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), Value::Str(value.to_string()));
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}
