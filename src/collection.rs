//! The set of dimmers a controller drives.
//!
//! Dimmers are addressed by number (`dimmer<num>`) from the API and config
//! layers, and by user-visible name from the UI. A collection built with a
//! factory can grow at runtime; its size is persisted as `n_dimmer`.

use core::fmt::Write;

use embedded_hal::pwm::SetDutyCycle;
use heapless::{String, Vec};

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::StripOutput;
use crate::ble::BleHost;
use crate::config::{ConfigStore, MAX_DIMMERS, dimmer_prefix, load_i32, save_i32};
use crate::dimmer::{Dimmer, DimmerContext, DimmerRequest, DimmerState};
use crate::error::Error;

/// Builds dimmer `num` of a growable collection
pub type DimmerFactory<P, S> = fn(num: u8) -> Dimmer<P, S>;

/// Identifier of dimmer `num` in API requests and replies
pub fn dimmer_ident(num: u8) -> String<12> {
    let mut ident = String::new();
    let _ = write!(ident, "dimmer{num}");
    ident
}

fn parse_ident(ident: &str) -> Option<u8> {
    ident.strip_prefix("dimmer")?.parse().ok()
}

pub struct DimmerCollection<P: SetDutyCycle, S: StripOutput> {
    dimmers: Vec<Dimmer<P, S>, MAX_DIMMERS>,
    factory: Option<DimmerFactory<P, S>>,
}

impl<P: SetDutyCycle, S: StripOutput> Default for DimmerCollection<P, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: SetDutyCycle, S: StripOutput> DimmerCollection<P, S> {
    /// Create a new fixed collection
    pub const fn new() -> Self {
        Self {
            dimmers: Vec::new(),
            factory: None,
        }
    }

    /// Create a new collection that can grow through `factory`
    pub const fn with_factory(factory: DimmerFactory<P, S>) -> Self {
        Self {
            dimmers: Vec::new(),
            factory: Some(factory),
        }
    }

    pub const fn is_dynamic(&self) -> bool {
        self.factory.is_some()
    }

    pub fn len(&self) -> usize {
        self.dimmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimmers.is_empty()
    }

    /// Add a dimmer; hands it back when the collection is full
    pub fn push(&mut self, dimmer: Dimmer<P, S>) -> Result<(), Dimmer<P, S>> {
        self.dimmers.push(dimmer)
    }

    pub fn at(&self, index: usize) -> Option<&Dimmer<P, S>> {
        self.dimmers.get(index)
    }

    pub fn at_mut(&mut self, index: usize) -> Option<&mut Dimmer<P, S>> {
        self.dimmers.get_mut(index)
    }

    pub fn by_num_mut(&mut self, num: u8) -> Option<&mut Dimmer<P, S>> {
        self.dimmers.iter_mut().find(|d| d.num() == num)
    }

    /// Find a dimmer by its user-visible name
    pub fn find(&mut self, name: &str) -> Option<&mut Dimmer<P, S>> {
        self.dimmers
            .iter_mut()
            .find(|d| d.core().user_visible_name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dimmer<P, S>> {
        self.dimmers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Dimmer<P, S>> {
        self.dimmers.iter_mut()
    }

    /// Grow a dynamic collection by one dimmer named `name`.
    ///
    /// Returns the new dimmer's number.
    #[allow(clippy::cast_possible_truncation)]
    pub fn push_new(&mut self, name: &str, ctx: &mut DimmerContext<'_>) -> Result<u8, Error> {
        let factory = self.factory.ok_or(Error::FixedCollection)?;
        if self.dimmers.is_full() {
            return Err(Error::CapacityExceeded);
        }
        let num = self.dimmers.len() as u8;
        let mut dimmer = factory(num);
        let request = DimmerRequest {
            name: Some(crate::ble::device_name(name)),
            ..DimmerRequest::default()
        };
        dimmer.apply_request(&request, ctx);
        self.dimmers.push(dimmer).map_err(|_| Error::CapacityExceeded)?;

        #[cfg(feature = "esp32-log")]
        println!("[collection] added dimmer{} ({})", num, name);
        Ok(num)
    }

    pub fn setup(&mut self, ctx: &mut DimmerContext<'_>) {
        for dimmer in &mut self.dimmers {
            dimmer.setup(ctx);
        }
    }

    /// Tick every dimmer, one after the other
    pub fn tick(&mut self, ctx: &mut DimmerContext<'_>) {
        for dimmer in &mut self.dimmers {
            dimmer.tick(ctx);
        }
    }

    /// State of every dimmer, for the API reply
    pub fn state(&self, ble: Option<&dyn BleHost>) -> Vec<DimmerState, MAX_DIMMERS> {
        self.dimmers.iter().map(|d| d.state(ble)).collect()
    }

    /// Apply a request addressed to `dimmer<num>`.
    ///
    /// Returns true if configuration changed and should be saved.
    pub fn apply_request(
        &mut self,
        ident: &str,
        request: &DimmerRequest,
        ctx: &mut DimmerContext<'_>,
    ) -> Result<bool, Error> {
        let num = parse_ident(ident).ok_or(Error::UnknownDimmer)?;
        let dimmer = self.by_num_mut(num).ok_or(Error::UnknownDimmer)?;
        Ok(dimmer.apply_request(request, ctx))
    }

    /// Load every dimmer from `parent`; a dynamic collection first grows to
    /// the stored size
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn load<C: ConfigStore + ?Sized>(
        &mut self,
        store: &C,
        parent: &str,
        mut ble: Option<&mut (dyn BleHost + '_)>,
    ) {
        if let Some(factory) = self.factory {
            let wanted = load_i32(store, parent, "n_dimmer", 0).max(0) as usize;
            while self.dimmers.len() < wanted.min(MAX_DIMMERS) {
                let num = self.dimmers.len() as u8;
                if self.dimmers.push(factory(num)).is_err() {
                    break;
                }
            }
        }
        for dimmer in &mut self.dimmers {
            let Some(prefix) = dimmer_prefix(parent, dimmer.num()) else {
                continue;
            };
            dimmer.load(store, &prefix, ble.as_deref_mut());
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn save<C: ConfigStore + ?Sized>(&self, store: &mut C, parent: &str, ble: Option<&dyn BleHost>) {
        if self.is_dynamic() {
            save_i32(store, parent, "n_dimmer", self.dimmers.len() as i32);
        }
        for dimmer in &self.dimmers {
            let Some(prefix) = dimmer_prefix(parent, dimmer.num()) else {
                continue;
            };
            dimmer.save(store, &prefix, ble);
        }
    }
}
