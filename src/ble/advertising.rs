//! BLE Advertising Controller
//!
//! Advertising runs only when requested. Boot posts the first request and
//! every disconnect posts another; the BLE task waits on the request signal,
//! advertises, and hands back the accepted connection.

use defmt::{debug, error, info};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::advertisement_builder::{
    Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
};
use nrf_softdevice::ble::peripheral::{self, Config as PeripheralConfig, ConnectableAdvertisement};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::{raw, RawError, Softdevice};

use crate::config::{ADV_INTERVAL, ADV_RETRY_MS, DEVICE_NAME, PREFERRED_CONN_PARAMS, SERVICE_UUID_LE};

/// Pending advertising request. Requests posted before the BLE task picks one
/// up collapse into one.
static ADV_REQUEST: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Flags and the complete 128-bit service list; 3 + 18 bytes
static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .services_128(ServiceList::Complete, &[SERVICE_UUID_LE])
    .build();

/// The name does not fit next to the service UUID, so it goes in the scan response
static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new().full_name(DEVICE_NAME).build();

/// Ask the BLE task to start an advertising round
pub fn request_advertising() {
    debug!("Advertising requested");
    ADV_REQUEST.signal(());
}

/// Wait for the next advertising request
pub async fn wait_for_request() {
    ADV_REQUEST.wait().await
}

/// Advertising parameters used for every round
pub fn peripheral_config() -> PeripheralConfig {
    PeripheralConfig {
        interval: ADV_INTERVAL,
        ..Default::default()
    }
}

/// Publish the peripheral preferred connection parameters
pub fn set_preferred_conn_params(_sd: &Softdevice) -> Result<(), RawError> {
    let ret = unsafe { raw::sd_ble_gap_ppcp_set(&PREFERRED_CONN_PARAMS) };
    RawError::convert(ret)
}

/// Wait for a request, then advertise until a central connects.
///
/// A failed start is retried after [`ADV_RETRY_MS`].
pub async fn advertise_when_requested(sd: &Softdevice, config: &PeripheralConfig) -> Connection {
    loop {
        wait_for_request().await;

        info!("Advertising as {=str}", DEVICE_NAME);

        let adv = ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &SCAN_DATA,
        };

        match peripheral::advertise_connectable(sd, adv, config).await {
            Ok(conn) => {
                info!("Central connected: {:?}", defmt::Debug2Format(&conn.peer_address()));
                return conn;
            }
            Err(e) => {
                error!("BLE advertising failed: {:?}", defmt::Debug2Format(&e));
                Timer::after(Duration::from_millis(ADV_RETRY_MS)).await;
                request_advertising();
            }
        }
    }
}
