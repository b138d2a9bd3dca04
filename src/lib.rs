#![no_std]

//! EchoBLE Peripheral Firmware Library
//!
//! A BLE peripheral for connectivity testing on the nRF52820 with the S140
//! SoftDevice: one service, a read/write characteristic that echoes the last
//! write back with an `ECHO>` prefix, and a notify characteristic that pushes a
//! timestamped string every few seconds to a subscribed central.
//!
//! - `device`: connection, echo and notification state machine
//! - `ble`: SoftDevice binding (advertising, GATT service, connection)
//! - `config`: identity, UUIDs, timing and SoftDevice settings

pub mod ble;
pub mod config;
pub mod device;
