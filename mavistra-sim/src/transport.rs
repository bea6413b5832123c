use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};
use mavistra_controller::{FrameSink, LinkStatus, Transport, TransportError};

#[derive(Default)]
struct LinkState {
    sink: Option<FrameSink<'static>>,
    advertising: bool,
    connected: bool,
    notifications: Vec<LinkStatus>,
}

/// The radio between the simulated peer and the controller
#[derive(Clone, Default)]
pub struct SimLink {
    state: Arc<Mutex<LinkState>>,
}

impl SimLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        // A panicking peer task must not take the controller down with it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Connect if the controller is advertising
    pub fn connect(&self) -> bool {
        let mut state = self.lock();
        if !state.advertising || state.connected {
            return false;
        }
        state.advertising = false;
        state.connected = true;
        true
    }

    pub fn disconnect(&self) {
        self.lock().connected = false;
    }

    pub fn is_advertising(&self) -> bool {
        self.lock().advertising
    }

    /// Write a frame. Returns false when there is no link to carry it
    pub fn write(&self, frame: &[u8]) -> bool {
        let sink = {
            let state = self.lock();
            if !state.connected {
                return false;
            }
            state.sink
        };

        match sink {
            Some(sink) => {
                sink.deliver(frame);
                true
            }
            None => false,
        }
    }

    pub fn notifications(&self) -> Vec<LinkStatus> {
        self.lock().notifications.clone()
    }
}

pub struct SimTransport {
    link: SimLink,
}

impl SimTransport {
    pub fn new(link: SimLink) -> Self {
        Self { link }
    }
}

impl Transport for SimTransport {
    fn open(
        &mut self,
        advertising_name: &str,
        sink: FrameSink<'static>,
    ) -> Result<(), TransportError> {
        let mut state = self.link.lock();
        if state.sink.is_some() {
            return Err(TransportError::Busy);
        }
        state.sink = Some(sink);
        info!("[sim] service open as {}", advertising_name);
        Ok(())
    }

    fn start_advertising(&mut self) -> Result<(), TransportError> {
        let mut state = self.link.lock();
        if state.sink.is_none() {
            return Err(TransportError::Advertising);
        }
        state.advertising = true;
        Ok(())
    }

    fn peer_count(&self) -> usize {
        usize::from(self.link.lock().connected)
    }

    fn notify(&mut self, status: LinkStatus) {
        let mut state = self.link.lock();
        if state.connected {
            debug!("[sim] notify {}", status.as_str());
        }
        state.notifications.push(status);
    }

    fn close(&mut self) {
        let mut state = self.link.lock();
        state.sink = None;
        state.advertising = false;
        state.connected = false;
        info!("[sim] service closed");
    }
}
