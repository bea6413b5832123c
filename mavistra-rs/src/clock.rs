use mavistra_controller::clock::{Clock, Instant};

pub struct EmbassyClock {}

impl EmbassyClock {
    pub fn new() -> Self {
        Self {}
    }
}

impl Clock for EmbassyClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(embassy_time::Instant::now().as_millis())
    }
}
