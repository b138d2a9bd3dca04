#![no_std]
#![no_main]

use defmt::*;
use defmt_rtt as _;
use echo_ble_firmware::ble::advertising;
use echo_ble_firmware::ble::connection::SoftdeviceLink;
use echo_ble_firmware::ble::services::{EchoServerEvent, Server};
use echo_ble_firmware::config::{self, POLL_INTERVAL_MS};
use echo_ble_firmware::device::PeripheralDevice;
use embassy_executor::Spawner;
use embassy_nrf::{config::Config, interrupt};
use embassy_time::{Duration, Instant, Timer};
use nrf_softdevice::ble::{self as sd_ble, gatt_server};
use nrf_softdevice::Softdevice;
use panic_probe as _;
use static_cell::StaticCell;

static DEVICE: PeripheralDevice = PeripheralDevice::new();
static SERVER: StaticCell<Server> = StaticCell::new();
static LINK: StaticCell<SoftdeviceLink> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Boot");

    // Configure nRF peripherals
    let mut nrf_config = Config::default();
    // Configure interrupt priorities to avoid SoftDevice reserved levels (0, 1, 4)
    nrf_config.gpiote_interrupt_priority = interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = interrupt::Priority::P2;

    let _peripherals = embassy_nrf::init(nrf_config);

    let sd = Softdevice::enable(&config::softdevice_config());
    info!("SoftDevice enabled");

    let device: &'static PeripheralDevice = &DEVICE;

    let server: &'static Server = SERVER.init(Server::new(sd, device).unwrap_or_else(|e| {
        defmt::panic!("Failed to register echo service: {:?}", e);
    }));
    let sd: &'static Softdevice = sd;

    let link: &'static SoftdeviceLink = LINK.init(SoftdeviceLink::new(server.handles().notify_value));

    info!("Device address: {:?}", defmt::Debug2Format(&sd_ble::get_address(sd)));

    if let Err(e) = advertising::set_preferred_conn_params(sd) {
        warn!("Preferred connection parameters not set: {:?}", defmt::Debug2Format(&e));
    }

    // Spawn SoftDevice task (CRITICAL!)
    unwrap!(spawner.spawn(softdevice_task(sd)));

    advertising::request_advertising();
    unwrap!(spawner.spawn(ble_task(sd, server, link, device)));

    info!("Ready");

    // Polling loop - rate-limited notification push
    loop {
        Timer::after(Duration::from_millis(POLL_INTERVAL_MS)).await;
        device.poll(Instant::now().as_millis(), link);
    }
}

#[embassy_executor::task]
async fn ble_task(
    sd: &'static Softdevice,
    server: &'static Server,
    link: &'static SoftdeviceLink,
    device: &'static PeripheralDevice,
) {
    let config = advertising::peripheral_config();

    loop {
        let conn = advertising::advertise_when_requested(sd, &config).await;

        device.on_connect();
        link.attach(&conn);

        // Run the GATT server on the connection. This returns when the connection gets disconnected.
        let e = gatt_server::run(&conn, server, |event| match event {
            EchoServerEvent::EchoWrite(value) => {
                // Rejections are logged by the device
                let _ = device.on_write(&value);
            }
            EchoServerEvent::NotifyCccdWrite(subscription) => device.on_subscription_change(subscription),
        })
        .await;

        debug!("gatt_server run exited: {:?}", defmt::Debug2Format(&e));

        link.detach();
        device.on_disconnect(link);
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}
