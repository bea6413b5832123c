use core::cell::{Cell, RefCell};

use crate::config::{
    CONNECTION_INTERVAL_US, MAX_ADVERTISING_NAME_LENGTH, MAX_FRAME_LENGTH, MAX_STATUS_LENGTH,
    STATUS_QUEUE_LENGTH,
};
use critical_section::Mutex;
use embassy_futures::select::{select, select3, Either, Either3};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use embassy_time::{Duration, Timer};
use esp_radio::ble::controller::BleConnector;
use heapless::String;
use log::{error, info, warn};
use mavistra_controller::{FrameSink, LinkStatus, Transport, TransportError};
use portable_atomic::{AtomicUsize, Ordering};
use trouble_host::prelude::*;

const SERVICE_UUID: Uuid = uuid!("19b10000-e8f2-537e-4f6c-d104768a1214");
const RX_COMMAND_UUID: Uuid = uuid!("19b10001-e8f2-537e-4f6c-d104768a1214");
const TX_EVENT_UUID: Uuid = uuid!("19b10002-e8f2-537e-4f6c-d104768a1214");
// Scan response payload minus the AD header
const MAX_SCAN_NAME_LENGTH: usize = 29;

type BleController = ExternalController<BleConnector<'static>, 20>;

// Written by the events task, sampled by the controller every poll
static PEER_COUNT: AtomicUsize = AtomicUsize::new(0);
static ADVERTISE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static STATUS: Channel<CriticalSectionRawMutex, LinkStatus, STATUS_QUEUE_LENGTH> = Channel::new();
static FRAME_SINK: Mutex<RefCell<Option<FrameSink<'static>>>> = Mutex::new(RefCell::new(None));
static LAST_STATUS: Mutex<Cell<Option<LinkStatus>>> = Mutex::new(Cell::new(None));
static ADVERTISING_NAME: Mutex<RefCell<String<MAX_ADVERTISING_NAME_LENGTH>>> =
    Mutex::new(RefCell::new(String::new()));

#[gatt_server]
pub struct Server {
    mavistra_service: MavistraService,
}

#[gatt_service(uuid = SERVICE_UUID)]
struct MavistraService {
    #[characteristic(uuid = RX_COMMAND_UUID, write, write_without_response)]
    rx_command: String<MAX_FRAME_LENGTH>,

    #[characteristic(uuid = TX_EVENT_UUID, read, notify)]
    tx_event: String<MAX_STATUS_LENGTH>,
}

/// Build the attribute table. The GAP name is fixed for the server's lifetime
pub fn new_server(name: &'static str) -> Option<Server<'static>> {
    match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name,
        appearance: &appearance::human_interface_device::GAMEPAD,
    })) {
        Ok(server) => Some(server),
        Err(err) => {
            error!("[gatt] could not create server: {:?}", err);
            None
        }
    }
}

/// [`Transport`] backed by the trouble-host tasks in this module.
///
/// The tasks own the radio and the attribute server. This side only flips
/// signals and reads the peer count, so every call returns without waiting
/// on the stack.
pub struct BleTransport {
    server_ready: bool,
    open: bool,
}

impl BleTransport {
    pub fn new(server_ready: bool) -> Self {
        Self {
            server_ready,
            open: false,
        }
    }
}

impl Transport for BleTransport {
    fn open(
        &mut self,
        advertising_name: &str,
        sink: FrameSink<'static>,
    ) -> Result<(), TransportError> {
        if self.open {
            return Err(TransportError::Busy);
        }
        if !self.server_ready {
            return Err(TransportError::Server);
        }

        let name = String::try_from(advertising_name).map_err(|_| TransportError::Advertising)?;
        critical_section::with(|cs| {
            ADVERTISING_NAME.replace(cs, name);
            FRAME_SINK.replace(cs, Some(sink));
            LAST_STATUS.borrow(cs).set(None);
        });
        STATUS.clear();

        self.open = true;
        info!("[gatt] service ready");
        Ok(())
    }

    fn start_advertising(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Advertising);
        }

        // Leave STOP set so a close() just before still drops the linked peer
        ADVERTISE.signal(());
        Ok(())
    }

    fn peer_count(&self) -> usize {
        PEER_COUNT.load(Ordering::Acquire)
    }

    fn notify(&mut self, status: LinkStatus) {
        // Readable even when nobody is subscribed
        critical_section::with(|cs| LAST_STATUS.borrow(cs).set(Some(status)));

        if PEER_COUNT.load(Ordering::Acquire) == 0 {
            return;
        }
        if STATUS.try_send(status).is_err() {
            warn!("[gatt] status queue full, dropped {}", status.as_str());
        }
    }

    fn close(&mut self) {
        critical_section::with(|cs| {
            FRAME_SINK.replace(cs, None);
        });
        ADVERTISE.reset();
        STOP.signal(());
        // The link is going away, the next poll must not read it as connected
        PEER_COUNT.store(0, Ordering::Release);

        self.open = false;
        info!("[gatt] closed");
    }
}

fn status_value(status: Option<LinkStatus>) -> String<MAX_STATUS_LENGTH> {
    status
        .and_then(|status| String::try_from(status.as_str()).ok())
        .unwrap_or_default()
}

fn is_open() -> bool {
    critical_section::with(|cs| FRAME_SINK.borrow_ref(cs).is_some())
}

/// Advertising would otherwise stay off until the next disconnect
async fn retry_advertising() {
    Timer::after_millis(1000).await;
    if is_open() {
        ADVERTISE.signal(());
    }
}

#[embassy_executor::task]
pub async fn ble_events_task(
    stack: &'static Stack<'static, BleController, DefaultPacketPool>,
    mut peripheral: Peripheral<'static, BleController, DefaultPacketPool>,
    server: &'static Server<'static>,
) {
    info!("Task BLE Events Started");

    loop {
        ADVERTISE.wait().await;
        // A close() while idle had no link to drop
        STOP.reset();
        let name = critical_section::with(|cs| ADVERTISING_NAME.borrow_ref(cs).clone());

        let connection = match select(advertise(&name, &mut peripheral), STOP.wait()).await {
            Either::First(Ok(connection)) => connection,
            Either::First(Err(err)) => {
                error!("[adv] error: {:?}", err);
                retry_advertising().await;
                continue;
            }
            Either::Second(()) => {
                info!("[adv] stopped");
                continue;
            }
        };

        configure_connection(stack, &connection).await;

        let gatt_connection = match connection.with_attribute_server(server) {
            Ok(gatt_connection) => gatt_connection,
            Err(err) => {
                error!("[gatt] could not attach attribute server: {:?}", err);
                retry_advertising().await;
                continue;
            }
        };

        STATUS.clear();
        PEER_COUNT.store(1, Ordering::Release);

        let events = gatt_events_task(server, &gatt_connection);
        let notify = status_notifications(server, &gatt_connection);

        match select3(events, notify, STOP.wait()).await {
            Either3::First(Err(err)) => error!("[gatt] error in events task: {:?}", err),
            Either3::Second(Err(err)) => error!("[gatt] error in notify task: {:?}", err),
            Either3::Third(()) => {
                info!("[gatt] dropping link");
                gatt_connection.raw().disconnect();
            }
            _ => {}
        }

        PEER_COUNT.store(0, Ordering::Release);
    }
}

#[embassy_executor::task]
pub async fn ble_runner_task(mut runner: Runner<'static, BleController, DefaultPacketPool>) {
    loop {
        if let Err(err) = runner.run().await {
            panic!("[ble_task] error: {:?}", err);
        }
    }
}

async fn configure_connection(
    stack: &Stack<'static, BleController, DefaultPacketPool>,
    connection: &Connection<'static, DefaultPacketPool>,
) {
    Timer::after_millis(100).await;

    if let Err(err) = connection.set_phy(stack, PhyKind::Le2M).await {
        warn!("[gatt] could not set 2M PHY: {:?}", err);
    }

    let connect_params = ConnectParams {
        min_connection_interval: Duration::from_micros(CONNECTION_INTERVAL_US),
        max_connection_interval: Duration::from_micros(CONNECTION_INTERVAL_US),
        ..Default::default()
    };
    if let Err(err) = connection
        .update_connection_params(stack, &connect_params)
        .await
    {
        warn!("[gatt] could not update connection params: {:?}", err);
    }

    info!("[gatt] MTU {:?}", connection.att_mtu());
}

async fn gatt_events_task<P: PacketPool>(
    server: &Server<'_>,
    connection: &GattConnection<'_, '_, P>,
) -> Result<(), Error> {
    let reason = loop {
        match connection.next().await {
            GattConnectionEvent::Disconnected { reason } => break reason,
            GattConnectionEvent::Gatt { event } => {
                match &event {
                    GattEvent::Read(read) => {
                        if read.handle() == server.mavistra_service.tx_event.handle {
                            let status = critical_section::with(|cs| LAST_STATUS.borrow(cs).get());
                            server.set(&server.mavistra_service.tx_event, &status_value(status))?;
                        }
                    }
                    GattEvent::Write(write) => {
                        if write.handle() == server.mavistra_service.rx_command.handle {
                            deliver_frame(write.data());
                        }
                    }
                    _ => {}
                };

                // Also done on drop, but the reply is only guaranteed to go out here
                match event.accept() {
                    Ok(reply) => reply.send().await,
                    Err(e) => {
                        error!("[gatt] error sending response: {:?}", e);
                    }
                };
            }
            _ => {} // ignore other Gatt Connection Events
        }
    };
    info!("[gatt] disconnected: {:?}", reason);
    Ok(())
}

fn deliver_frame(raw: &[u8]) {
    let sink = critical_section::with(|cs| *FRAME_SINK.borrow_ref(cs));
    match sink {
        Some(sink) => sink.deliver(raw),
        None => warn!("[gatt] frame received while closed"),
    }
}

/// Create an advertiser to use to connect to a BLE Central, and wait for it to connect.
async fn advertise<'values, C: Controller>(
    name: &str,
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
) -> Result<Connection<'values, DefaultPacketPool>, BleHostError<C::Error>> {
    let uuid: [u8; 16] = SERVICE_UUID
        .as_raw()
        .try_into()
        .expect("Service UUID is 128 bit");

    let mut advertiser_data = [0; 31];
    let len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::ServiceUuids128(&[uuid]),
        ],
        &mut advertiser_data[..],
    )?;

    // The name goes into the scan response, the UUID leaves no room for it above
    let mut scan_data = [0; 31];
    let local_name = if name.len() <= MAX_SCAN_NAME_LENGTH {
        AdStructure::CompleteLocalName(name.as_bytes())
    } else {
        let mut end = MAX_SCAN_NAME_LENGTH;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        AdStructure::ShortenedLocalName(&name.as_bytes()[..end])
    };
    let scan_len = AdStructure::encode_slice(&[local_name], &mut scan_data[..])?;

    let advertiser = peripheral
        .advertise(
            &Default::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data: &advertiser_data[..len],
                scan_data: &scan_data[..scan_len],
            },
        )
        .await?;
    info!("[adv] advertising as {}", name);
    let conn = advertiser.accept().await?;
    info!("[adv] connection established");
    Ok(conn)
}

async fn status_notifications<P: PacketPool>(
    server: &Server<'_>,
    connection: &GattConnection<'_, '_, P>,
) -> Result<(), Error> {
    loop {
        let status = STATUS.receive().await;
        server
            .mavistra_service
            .tx_event
            .notify(connection, &status_value(Some(status)))
            .await?;
    }
}
