//! BLE Protocol Implementation
//!
//! SoftDevice-facing pieces of the EchoBLE peripheral: advertising control,
//! the echo GATT service, connection tracking and CCCD decoding.

pub mod advertising;
pub mod connection;
pub mod services;
pub mod subscription;
pub mod uuid;
