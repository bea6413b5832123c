mod clock;
mod peer;
mod transport;

use std::time::Duration;

use log::info;
use mavistra_controller::{
    Controller, ControllerCell, ControllerConfig, config::CONTROL_LOOP_INTERVAL_MS,
};
use tokio::task;

use crate::{
    clock::SimClock,
    peer::{BUTTONS, DEMO_SCRIPT, Peer},
    transport::{SimLink, SimTransport},
};

type SimController = Controller<SimTransport, SimClock>;

static CONTROLLER: ControllerCell<SimTransport, SimClock> = ControllerCell::new();

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let link = SimLink::new();
    let controller = CONTROLLER.init(
        ControllerConfig::default(),
        SimTransport::new(link.clone()),
        SimClock::new(),
    )?;
    controller.begin()?;

    // Peers are expected to resend at a third of the timeout
    let resend = Duration::from_millis(controller.command_timeout().to_millis() / 3);
    let control_loop = task::spawn(run_control_loop(controller));

    Peer::new(link.clone(), resend).run(&DEMO_SCRIPT).await;
    control_loop.abort();

    for status in link.notifications() {
        info!("notified {}", status.as_str());
    }
    Ok(())
}

async fn run_control_loop(controller: &'static mut SimController) {
    let mut interval = tokio::time::interval(Duration::from_millis(CONTROL_LOOP_INTERVAL_MS));
    let mut held = [false; BUTTONS.len()];

    loop {
        interval.tick().await;
        controller.poll();

        for (button, was_held) in BUTTONS.iter().zip(held.iter_mut()) {
            let active = controller.is_active(button);
            if active != *was_held {
                *was_held = active;
                info!(
                    "{} {} at {:?}",
                    button,
                    if active { "pressed" } else { "released" },
                    controller.last_activity()
                );
            }
        }
    }
}
