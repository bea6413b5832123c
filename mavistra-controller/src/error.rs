//! Error types shared by the controller and its transports.
//!
//! Every variant is `Copy` and carries no heap data so the enum can be
//! returned from interrupt-adjacent code without `alloc`.

use thiserror::Error;

/// Top-level error type of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The transport could not be brought up. Partial resources were released.
    #[error("transport initialisation failed: {0}")]
    Transport(#[from] TransportError),

    /// A controller already owns the transport in this process.
    #[error("a controller has already been constructed")]
    AlreadyConstructed,

    /// The operation is only allowed before `begin()`.
    #[error("the controller has already been started")]
    AlreadyStarted,

    /// No room for another distinct command identifier.
    #[error("command registry is full")]
    RegistryFull,

    /// The identifier does not fit the registry's key storage.
    #[error("command identifier is too long")]
    IdentifierTooLong,
}

/// The stage at which a transport failed to initialise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("server could not be created")]
    Server,
    #[error("service could not be created")]
    Service,
    #[error("characteristic could not be created")]
    Characteristic,
    #[error("advertising could not be started")]
    Advertising,
    #[error("transport is already open")]
    Busy,
}
