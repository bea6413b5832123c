use mavistra_controller::clock::{Clock, Instant as ClockInstant};
use tokio::time::Instant;

/// Milliseconds since the simulation started. Follows tokio's clock so a
/// paused runtime drives it too
pub struct SimClock {
    start_time: Instant,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> ClockInstant {
        // Saturates instead of wrapping, half a billion years out
        let elapsed = u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        ClockInstant::from_ticks(elapsed)
    }
}
