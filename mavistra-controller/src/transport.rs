//! The seam between the controller and the radio stack.
//!
//! A transport owns every radio resource. It never owns the controller: it
//! only receives a [`FrameSink`] when opened and pushes raw frames into it
//! from whatever context its stack runs in.

use log::{debug, warn};

use crate::{
    clock::Clock,
    error::TransportError,
    frame::parse_frame,
    link::LinkStatus,
    registry::SharedRegistry,
};

pub trait Transport {
    /// Create the server, service and characteristics and start routing
    /// written frames into `sink`.
    ///
    /// On failure the controller calls [`Transport::close`], which has to
    /// release whatever was created before the failing step.
    fn open(&mut self, advertising_name: &str, sink: FrameSink<'static>)
    -> Result<(), TransportError>;

    /// Become discoverable so a peer can connect
    fn start_advertising(&mut self) -> Result<(), TransportError>;

    /// Number of peers currently linked
    fn peer_count(&self) -> usize;

    /// Push a status string to subscribed peers if the transport can
    fn notify(&mut self, status: LinkStatus);

    /// Stop advertising, drop any link and free all radio resources
    fn close(&mut self);
}

/// Write path from the transport into the command registry
#[derive(Clone, Copy)]
pub struct FrameSink<'a> {
    registry: &'a SharedRegistry,
    clock: &'a (dyn Clock + Sync),
}

impl<'a> FrameSink<'a> {
    pub fn new(registry: &'a SharedRegistry, clock: &'a (dyn Clock + Sync)) -> Self {
        Self { registry, clock }
    }

    /// Parse one complete frame and record its command as seen now
    pub fn deliver(&self, raw: &[u8]) {
        let Some(frame) = parse_frame(raw) else {
            debug!("Dropped malformed frame ({} bytes)", raw.len());
            return;
        };

        let now = self.clock.now();
        match self
            .registry
            .with(|registry| registry.record(frame.identifier, now))
        {
            Ok(()) => debug!("cmd: {}", frame.identifier),
            Err(err) => warn!("Dropped cmd {}: {}", frame.identifier, err),
        }
    }
}
