pub type ClockDuration = fugit::Duration<u64, 1, 1_000>;
pub type ClockInstant = fugit::Instant<u64, 1, 1_000>;

pub use ClockDuration as Duration;
pub use ClockInstant as Instant;

/// Monotonic millisecond clock provided by the platform
pub trait Clock {
    fn now(&self) -> Instant;
}
