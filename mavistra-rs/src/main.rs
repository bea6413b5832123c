#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

mod clock;
mod config;
mod control;
mod remote;

use crate::clock::EmbassyClock;
use crate::control::control_task;
use crate::remote::ble::{ble_events_task, ble_runner_task, new_server, BleTransport, Server};

use config::{ADVERTISING_NAME, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX};
use embassy_executor::Spawner;
use esp_hal::{
    clock::CpuClock, interrupt::software::SoftwareInterruptControl, timer::systimer::SystemTimer,
};
use esp_radio::ble::controller::BleConnector;
use log::{error, info};
use mavistra_controller::{AdvertisingName, ControllerCell, ControllerConfig};
use trouble_host::{
    prelude::{DefaultPacketPool, ExternalController},
    Host, HostResources,
};

use {esp_backtrace as _, esp_println as _};

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

// When you are okay with using a nightly compiler it's better to use https://docs.rs/static_cell/2.1.0/static_cell/macro.make_static.html
macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

static CONTROLLER: ControllerCell<BleTransport, EmbassyClock> = ControllerCell::new();

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    info!("Welcome to mavistra-rs");
    info!("Version: {}", env!("VERGEN_GIT_DESCRIBE"));

    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    let systimer = SystemTimer::new(peripherals.SYSTIMER);

    esp_rtos::start(
        systimer.alarm0,
        #[cfg(target_arch = "riscv32")]
        sw_int.software_interrupt0,
    );

    let radio = &*mk_static!(
        esp_radio::Controller<'static>,
        esp_radio::init().expect("Failed to initialize BLE controller")
    );

    let bluetooth = peripherals.BT;
    let connector = BleConnector::new(radio, bluetooth, Default::default());
    let bt_controller: ExternalController<_, 20> = ExternalController::new(connector);

    let resources = mk_static!(HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX>, HostResources::new());
    let stack = mk_static!(
        trouble_host::Stack<
            'static,
            ExternalController<BleConnector<'static>, 20>,
            DefaultPacketPool,
        >,
        trouble_host::new(bt_controller, resources)
    );

    let Host {
        peripheral, runner, ..
    } = stack.build();

    let controller_config = ControllerConfig::new(ADVERTISING_NAME);
    let gap_name = mk_static!(AdvertisingName, controller_config.advertising_name.clone());
    let server = new_server(gap_name.as_str()).map(|server| &*mk_static!(Server<'static>, server));

    let controller = CONTROLLER
        .init(controller_config, BleTransport::new(server.is_some()), EmbassyClock::new())
        .expect("Controller constructed twice");

    spawner.must_spawn(ble_runner_task(runner));
    if let Some(server) = server {
        spawner.must_spawn(ble_events_task(stack, peripheral, server));
    }

    if let Err(err) = controller.begin() {
        error!("BLE unavailable: {}", err);
    }

    spawner.must_spawn(control_task(controller));
}
