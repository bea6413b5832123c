//! Connection lifecycle.
//!
//! The transport only reports how many peers are linked. [`LinkMonitor`]
//! samples that count once per poll and turns it into at most one
//! [`LinkTransition`], so callbacks racing with the poll loop never produce
//! duplicate events.

/// Status strings notified to subscribed peers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Connected => "status:connected",
            LinkStatus::Disconnected => "status:disconnected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTransition {
    Connected,
    Disconnected,
}

impl LinkTransition {
    pub fn status(&self) -> LinkStatus {
        match self {
            LinkTransition::Connected => LinkStatus::Connected,
            LinkTransition::Disconnected => LinkStatus::Disconnected,
        }
    }
}

#[derive(Debug, Default)]
pub struct LinkMonitor {
    connected: bool,
    last_observed: bool,
}

impl LinkMonitor {
    pub const fn new() -> Self {
        Self {
            connected: false,
            last_observed: false,
        }
    }

    /// Sample the peer count. Any count above zero is a single connected peer
    pub fn observe(&mut self, peer_count: usize) -> Option<LinkTransition> {
        self.connected = peer_count > 0;

        if self.connected == self.last_observed {
            return None;
        }
        self.last_observed = self.connected;

        if self.connected {
            Some(LinkTransition::Connected)
        } else {
            Some(LinkTransition::Disconnected)
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
