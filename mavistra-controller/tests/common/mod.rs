#![allow(dead_code)]

use std::{
    ops::{Deref, DerefMut},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use mavistra_controller::{
    Clock, Controller, ControllerCell, ControllerConfig, FrameSink, Instant, LinkStatus,
    Transport, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Open,
    Advertise,
    Notify(LinkStatus),
    Close,
}

#[derive(Default)]
pub struct FakeState {
    pub events: Vec<Event>,
    pub advertised_name: Option<String>,
    pub peer_count: usize,
    pub fail_open: Option<TransportError>,
    pub fail_advertising: bool,
    sink: Option<FrameSink<'static>>,
}

/// Transport that records every call and lets the test play the peer
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Clone)]
pub struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> (Self, FakeHandle) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        (
            Self {
                state: state.clone(),
            },
            FakeHandle { state },
        )
    }
}

impl Transport for FakeTransport {
    fn open(
        &mut self,
        advertising_name: &str,
        sink: FrameSink<'static>,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Open);
        if let Some(err) = state.fail_open {
            return Err(err);
        }
        state.advertised_name = Some(advertising_name.to_string());
        state.sink = Some(sink);
        Ok(())
    }

    fn start_advertising(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Advertise);
        if state.fail_advertising {
            return Err(TransportError::Advertising);
        }
        Ok(())
    }

    fn peer_count(&self) -> usize {
        self.state.lock().unwrap().peer_count
    }

    fn notify(&mut self, status: LinkStatus) {
        self.state.lock().unwrap().events.push(Event::Notify(status));
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Close);
        state.sink = None;
        state.peer_count = 0;
    }
}

impl FakeHandle {
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn events(&self) -> Vec<Event> {
        self.with(|state| state.events.clone())
    }

    pub fn count(&self, event: Event) -> usize {
        self.with(|state| state.events.iter().filter(|e| **e == event).count())
    }

    pub fn notifications(&self) -> Vec<LinkStatus> {
        self.with(|state| {
            state
                .events
                .iter()
                .filter_map(|event| match event {
                    Event::Notify(status) => Some(*status),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn set_peer_count(&self, peer_count: usize) {
        self.with(|state| state.peer_count = peer_count);
    }

    /// Write a frame the way a peer would. Panics if the transport is not open
    pub fn write(&self, frame: &[u8]) {
        let sink = self
            .with(|state| state.sink)
            .expect("transport is not open");
        sink.deliver(frame);
    }

    pub fn is_open(&self) -> bool {
        self.with(|state| state.sink.is_some())
    }
}

#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::Release);
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.0.load(Ordering::Acquire))
    }
}

pub type TestController = Controller<FakeTransport, ManualClock>;
pub type TestCell = ControllerCell<FakeTransport, ManualClock>;

// Only one controller may be live per process, so tests take turns
static SERIAL: Mutex<()> = Mutex::new(());

pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The live controller of one test. Retired on drop, even when the test panics
pub struct Fixture {
    controller: Option<&'static mut TestController>,
    _serial: MutexGuard<'static, ()>,
}

impl Deref for Fixture {
    type Target = TestController;

    fn deref(&self) -> &TestController {
        self.controller.as_deref().expect("controller is live")
    }
}

impl DerefMut for Fixture {
    fn deref_mut(&mut self) -> &mut TestController {
        self.controller.as_deref_mut().expect("controller is live")
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.retire();
        }
    }
}

pub fn setup(cell: &'static TestCell, config: ControllerConfig) -> (Fixture, FakeHandle, ManualClock) {
    let serial = serial();
    let (transport, handle) = FakeTransport::new();
    let clock = ManualClock::default();
    let controller = cell
        .init(config, transport, clock.clone())
        .expect("cell is used once per test");
    let fixture = Fixture {
        controller: Some(controller),
        _serial: serial,
    };
    (fixture, handle, clock)
}

pub fn started(cell: &'static TestCell) -> (Fixture, FakeHandle, ManualClock) {
    let (mut controller, handle, clock) = setup(cell, ControllerConfig::default());
    controller.begin().expect("fake transport opens");
    (controller, handle, clock)
}
