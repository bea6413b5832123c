use embassy_time::{Duration, Ticker};
use log::info;
use mavistra_controller::Controller;

use crate::{
    clock::EmbassyClock,
    config::{CONTROL_LOOP_INTERVAL_MS, WATCHED_BUTTONS},
    remote::ble::BleTransport,
};

pub type RemoteController = Controller<BleTransport, EmbassyClock>;

/// Polls the controller and reports button edges
#[embassy_executor::task]
pub async fn control_task(controller: &'static mut RemoteController) {
    info!("Task Control Loop Started");

    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_LOOP_INTERVAL_MS));
    let mut held = [false; WATCHED_BUTTONS.len()];
    let mut connected = false;

    loop {
        controller.poll();

        if controller.is_connected() != connected {
            connected = controller.is_connected();
            info!("Remote {}", if connected { "linked" } else { "lost" });
        }

        for (button, was_held) in WATCHED_BUTTONS.iter().zip(held.iter_mut()) {
            let active = controller.is_active(button);
            if active != *was_held {
                *was_held = active;
                if active {
                    info!("{} pressed", button);
                } else {
                    info!("{} released", button);
                }
            }
        }

        ticker.next().await;
    }
}
