use std::time::Duration;

use log::{info, warn};
use tokio::time::{Instant, interval, sleep};

use crate::transport::SimLink;

// Give up connecting when the controller never advertises
const CONNECT_ATTEMPTS: u32 = 100;
const CONNECT_RETRY: Duration = Duration::from_millis(10);

/// Buttons the demo script presses
pub const BUTTONS: [&str; 3] = ["L_UP", "BTN_1", "R_CENTER"];

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Connect,
    Hold { button: &'static str, for_ms: u64 },
    Idle { for_ms: u64 },
    Disconnect,
}

pub const DEMO_SCRIPT: [Step; 9] = [
    Step::Connect,
    Step::Hold {
        button: "L_UP",
        for_ms: 600,
    },
    Step::Idle { for_ms: 300 },
    Step::Hold {
        button: "BTN_1",
        for_ms: 400,
    },
    // Drop the link while the button is still held
    Step::Disconnect,
    Step::Idle { for_ms: 200 },
    Step::Connect,
    Step::Hold {
        button: "R_CENTER",
        for_ms: 300,
    },
    Step::Idle { for_ms: 300 },
];

/// Remote that plays a script of presses and link drops
pub struct Peer {
    link: SimLink,
    resend: Duration,
}

impl Peer {
    pub fn new(link: SimLink, resend: Duration) -> Self {
        Self { link, resend }
    }

    pub async fn run(&self, script: &[Step]) {
        for step in script {
            self.step(*step).await;
        }
    }

    async fn step(&self, step: Step) {
        match step {
            Step::Connect => self.connect().await,
            Step::Hold { button, for_ms } => self.hold(button, for_ms).await,
            Step::Idle { for_ms } => sleep(Duration::from_millis(for_ms)).await,
            Step::Disconnect => {
                info!("[peer] disconnecting");
                self.link.disconnect();
            }
        }
    }

    async fn connect(&self) {
        for _ in 0..CONNECT_ATTEMPTS {
            if self.link.connect() {
                info!("[peer] connected");
                return;
            }
            sleep(CONNECT_RETRY).await;
        }
        warn!("[peer] controller is not advertising");
    }

    async fn hold(&self, button: &str, for_ms: u64) {
        info!("[peer] holding {} for {} ms", button, for_ms);

        let frame = format!("{button}\r\n");
        let deadline = Instant::now() + Duration::from_millis(for_ms);
        let mut ticker = interval(self.resend);

        while Instant::now() < deadline {
            ticker.tick().await;
            if !self.link.write(frame.as_bytes()) {
                warn!("[peer] {} not delivered, no link", button);
            }
        }
    }
}
