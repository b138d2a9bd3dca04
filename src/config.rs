//! Firmware Configuration
//!
//! Compile-time identity, GATT layout limits, timing and SoftDevice settings.
//! Nothing here is adjustable at runtime.

use core::mem;

use nrf_softdevice::{raw, Config as SdConfig};

use crate::ble::uuid::parse_uuid;

/// Advertised and GAP device name
pub const DEVICE_NAME: &str = "EchoBLE";

/// Echo service UUID
pub const SERVICE_UUID: &str = "12345678-1234-5678-1234-56789abcdef0";
/// Read/write echo characteristic UUID
pub const ECHO_CHAR_UUID: &str = "12345678-1234-5678-1234-56789abcdef1";
/// Notify-only characteristic UUID
pub const NOTIFY_CHAR_UUID: &str = "12345678-1234-5678-1234-56789abcdef2";

pub const SERVICE_UUID_LE: [u8; 16] = parse_uuid(SERVICE_UUID);
pub const ECHO_CHAR_UUID_LE: [u8; 16] = parse_uuid(ECHO_CHAR_UUID);
pub const NOTIFY_CHAR_UUID_LE: [u8; 16] = parse_uuid(NOTIFY_CHAR_UUID);

/// Marker prepended to the stored value on every read
pub const ECHO_PREFIX: &[u8] = b"ECHO>";

/// Text preceding the tick count in notification payloads
pub const NOTIFY_PREFIX: &str = "Notification data ";

/// Minimum gap between two notifications (milliseconds, exclusive)
pub const NOTIFY_INTERVAL_MS: u64 = 3000;

/// Polling loop period (milliseconds)
pub const POLL_INTERVAL_MS: u64 = 100;

/// Negotiated ATT MTU upper bound
pub const ATT_MTU: u16 = 247;

/// Largest value a single ATT write can carry (MTU minus opcode and handle)
pub const MAX_WRITE_LEN: usize = ATT_MTU as usize - 3;

/// Capacity of the echo characteristic: prefix plus the largest write
pub const ECHO_VALUE_LEN: usize = ECHO_PREFIX.len() + MAX_WRITE_LEN;

/// Capacity of the notify characteristic: prefix plus up to 20 decimal digits
pub const NOTIFY_VALUE_LEN: usize = NOTIFY_PREFIX.len() + 20;

/// Advertising interval (units of 0.625ms)
pub const ADV_INTERVAL: u32 = 160; // 100ms

/// Delay before retrying a failed advertising start (milliseconds)
pub const ADV_RETRY_MS: u64 = 1000;

/// Peripheral preferred connection parameters.
///
/// A 7.5ms - 22.5ms interval window keeps iOS centrals from rejecting the link.
pub const PREFERRED_CONN_PARAMS: raw::ble_gap_conn_params_t = raw::ble_gap_conn_params_t {
    min_conn_interval: 0x06, // 7.5ms
    max_conn_interval: 0x12, // 22.5ms
    slave_latency: 0,
    conn_sup_timeout: 400, // 4s
};

/// SoftDevice configuration: one peripheral link, large MTU, GAP name set to
/// [`DEVICE_NAME`].
pub fn softdevice_config() -> SdConfig {
    SdConfig {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        // One vendor base covers the service and both characteristics
        common_vs_uuid: Some(raw::ble_common_cfg_vs_uuid_t { vs_uuid_count: 1 }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as *const u8 as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(raw::BLE_GATTS_VLOC_STACK as u8),
        }),
        ..Default::default()
    }
}
