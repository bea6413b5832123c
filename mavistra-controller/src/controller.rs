//! The controller facade.
//!
//! [`Controller`] composes the frame sink, the command registry and the link
//! monitor behind the API the application polls every cycle. There is one
//! controller per process: it is only handed out by [`ControllerCell::init`].

use core::cell::Cell;

use critical_section::Mutex;
use heapless::String;
use log::{error, info, warn};
use static_cell::StaticCell;

use crate::{
    clock::{Clock, Duration, Instant},
    config::{DEFAULT_ADVERTISING_NAME, DEFAULT_COMMAND_TIMEOUT, MAX_ADVERTISING_NAME_LENGTH},
    error::Error,
    link::{LinkMonitor, LinkStatus, LinkTransition},
    registry::{CommandRegistry, SharedRegistry},
    transport::{FrameSink, Transport},
};

/// Name presented to peers while advertising
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingName(String<MAX_ADVERTISING_NAME_LENGTH>);

impl AdvertisingName {
    /// Empty names fall back to the default. Long names are cut at a character boundary
    pub fn new(name: &str) -> Self {
        let name = if name.is_empty() {
            DEFAULT_ADVERTISING_NAME
        } else {
            name
        };

        let mut truncated = String::new();
        for c in name.chars() {
            if truncated.push(c).is_err() {
                break;
            }
        }
        Self(truncated)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for AdvertisingName {
    fn default() -> Self {
        Self::new(DEFAULT_ADVERTISING_NAME)
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub advertising_name: AdvertisingName,
    // How long a command stays held after its last frame
    pub command_timeout: Duration,
}

impl ControllerConfig {
    pub fn new(advertising_name: &str) -> Self {
        Self {
            advertising_name: AdvertisingName::new(advertising_name),
            ..Default::default()
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            advertising_name: AdvertisingName::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

// Set while any cell's controller is live
static CONSTRUCTED: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

fn claim_process_slot() -> bool {
    !critical_section::with(|cs| CONSTRUCTED.borrow(cs).replace(true))
}

fn free_process_slot() {
    critical_section::with(|cs| CONSTRUCTED.borrow(cs).set(false));
}

/// Static storage for the one controller of the process
pub struct ControllerCell<T: Transport, C: Clock + Sync + 'static> {
    clock: StaticCell<C>,
    registry: StaticCell<SharedRegistry>,
    controller: StaticCell<Controller<T, C>>,
}

impl<T: Transport, C: Clock + Sync + 'static> ControllerCell<T, C> {
    pub const fn new() -> Self {
        Self {
            clock: StaticCell::new(),
            registry: StaticCell::new(),
            controller: StaticCell::new(),
        }
    }

    /// Construct the controller.
    ///
    /// Fails with [`Error::AlreadyConstructed`] while a controller from any
    /// cell is live, and on every call to a cell that was used before. Either
    /// case would mean two owners of one transport.
    pub fn init(
        &'static self,
        config: ControllerConfig,
        transport: T,
        clock: C,
    ) -> Result<&'static mut Controller<T, C>, Error> {
        if !claim_process_slot() {
            error!("[controller] A controller has already been constructed");
            return Err(Error::AlreadyConstructed);
        }
        let Some(clock) = self.clock.try_init(clock) else {
            free_process_slot();
            error!("[controller] This cell already handed out its controller");
            return Err(Error::AlreadyConstructed);
        };
        let registry = self.registry.init(SharedRegistry::new());

        Ok(self
            .controller
            .init(Controller::new(config, transport, clock, registry)))
    }
}

impl<T: Transport, C: Clock + Sync + 'static> Default for ControllerCell<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Controller<T: Transport, C: Clock + Sync + 'static> {
    transport: T,
    clock: &'static C,
    registry: &'static SharedRegistry,
    link: LinkMonitor,
    advertising_name: AdvertisingName,
    command_timeout: Duration,
    initialized: bool,
}

impl<T: Transport, C: Clock + Sync + 'static> Controller<T, C> {
    fn new(
        config: ControllerConfig,
        transport: T,
        clock: &'static C,
        registry: &'static SharedRegistry,
    ) -> Self {
        Self {
            transport,
            clock,
            registry,
            link: LinkMonitor::new(),
            advertising_name: config.advertising_name,
            command_timeout: config.command_timeout,
            initialized: false,
        }
    }

    /// Bring up the transport and start advertising.
    ///
    /// Calling it again once initialised succeeds without side effects. On
    /// failure the transport is closed and `begin()` may be retried.
    pub fn begin(&mut self) -> Result<(), Error> {
        if self.initialized {
            info!("[controller] begin() already initialized");
            return Ok(());
        }

        info!(
            "[controller] Initializing BLE as: {}",
            self.advertising_name.as_str()
        );

        let sink = FrameSink::new(self.registry, self.clock);
        if let Err(err) = self.transport.open(self.advertising_name.as_str(), sink) {
            error!("[controller] ERROR: {}", err);
            self.transport.close();
            return Err(err.into());
        }

        if let Err(err) = self.transport.start_advertising() {
            error!("[controller] ERROR: {}", err);
            self.transport.close();
            return Err(err.into());
        }
        info!("[controller] Advertising started");

        self.link.reset();
        self.initialized = true;
        Ok(())
    }

    /// Run one poll cycle: detect link transitions, then release stale commands
    pub fn poll(&mut self) {
        if !self.initialized {
            return;
        }

        if let Some(transition) = self.link.observe(self.transport.peer_count()) {
            self.apply_transition(transition);
        }

        let now = self.clock.now();
        let timeout = self.command_timeout;
        self.registry.with(|registry| registry.sweep(now, timeout));
    }

    fn apply_transition(&mut self, transition: LinkTransition) {
        match transition {
            LinkTransition::Connected => {
                info!("[controller] BLE client connected");
                self.transport.notify(LinkStatus::Connected);
            }
            LinkTransition::Disconnected => {
                info!("[controller] BLE client disconnected");
                self.registry.with(CommandRegistry::clear_all);
                self.transport.notify(LinkStatus::Disconnected);

                match self.transport.start_advertising() {
                    Ok(()) => info!("[controller] Advertising restarted"),
                    Err(err) => error!("[controller] ERROR: cannot restart advertising: {}", err),
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Whether the peer is currently holding `identifier`
    pub fn is_active(&self, identifier: &str) -> bool {
        self.registry.with(|registry| registry.is_active(identifier))
    }

    /// Only accepted before `begin()`. The running timeout is kept otherwise
    pub fn set_command_timeout(&mut self, timeout: Duration) -> Result<(), Error> {
        if self.initialized {
            warn!(
                "[controller] Command timeout change to {} ms ignored after begin()",
                timeout.to_millis()
            );
            return Err(Error::AlreadyStarted);
        }

        self.command_timeout = timeout;
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// When the most recent accepted frame arrived
    pub fn last_activity(&self) -> Option<Instant> {
        self.registry.with(|registry| registry.last_activity())
    }

    pub fn advertising_name(&self) -> &str {
        self.advertising_name.as_str()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Tear down the transport and forget every command, as before `begin()`
    pub fn reset(&mut self) {
        self.release();
        self.link.reset();
        self.registry.with(CommandRegistry::forget_all);
    }

    /// Shut the controller down for good.
    ///
    /// The transport is released as on teardown and another cell may construct
    /// the next controller. This cell stays spent.
    pub fn retire(&'static mut self) {
        self.release();
        self.registry.with(CommandRegistry::forget_all);
        free_process_slot();
        info!("[controller] Retired");
    }

    fn release(&mut self) {
        if self.initialized {
            self.transport.close();
            self.initialized = false;
        }
    }
}

impl<T: Transport, C: Clock + Sync + 'static> Drop for Controller<T, C> {
    fn drop(&mut self) {
        self.release();
    }
}
