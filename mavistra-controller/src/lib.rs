//! Held-button remote control over a single BLE link.
//!
//! A peer keeps a button held by re-sending its identifier faster than the
//! command timeout. The application polls [`Controller::poll`] every control
//! cycle and reads the held state with [`Controller::is_active`].

#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod link;
pub mod registry;
pub mod transport;

pub use clock::{Clock, Duration, Instant};
pub use controller::{AdvertisingName, Controller, ControllerCell, ControllerConfig};
pub use error::{Error, TransportError};
pub use link::LinkStatus;
pub use transport::{FrameSink, Transport};
