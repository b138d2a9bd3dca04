//! GATT Server Services Module
//!
//! Registers the echo service and turns SoftDevice write events into
//! [`EchoServerEvent`]s for the BLE task.
//!
//! The echo characteristic is registered with deferred reads: every read
//! request is answered from [`PeripheralDevice::on_read`], never from the
//! attribute table.

use defmt::{debug, warn, Format};
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, RegisterError, WriteOp};
use nrf_softdevice::ble::{Connection, DeferredReadReply, GattError, Uuid};
use nrf_softdevice::Softdevice;

use crate::ble::subscription::Subscription;
use crate::config::{
    ECHO_CHAR_UUID_LE, ECHO_PREFIX, ECHO_VALUE_LEN, NOTIFY_CHAR_UUID_LE, NOTIFY_VALUE_LEN, SERVICE_UUID_LE,
};
use crate::device::{PeripheralDevice, StoredValue};

/// Server events delivered to the BLE task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoServerEvent {
    /// Central wrote the echo characteristic
    EchoWrite(StoredValue),
    /// Central changed the notify characteristic CCCD
    NotifyCccdWrite(Subscription),
}

/// Attribute handles of the echo service
#[derive(Debug, Clone, Copy, Format)]
pub struct ServiceHandles {
    pub service: u16,
    pub echo_value: u16,
    pub notify_value: u16,
    pub notify_cccd: u16,
}

/// Main GATT Server implementation
pub struct Server {
    handles: ServiceHandles,
    device: &'static PeripheralDevice,
}

impl Server {
    /// Register the echo service and both characteristics
    pub fn new(sd: &mut Softdevice, device: &'static PeripheralDevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, Uuid::new_128(&SERVICE_UUID_LE))?;

        // Reply length is bounded by the attribute, so it holds prefix plus the largest stored value
        let echo = sb
            .add_characteristic(
                Uuid::new_128(&ECHO_CHAR_UUID_LE),
                Attribute::new(ECHO_PREFIX)
                    .variable_len(ECHO_VALUE_LEN as u16)
                    .deferred_read(),
                Metadata::new(Properties::new().read().write()),
            )?
            .build();

        let notify = sb
            .add_characteristic(
                Uuid::new_128(&NOTIFY_CHAR_UUID_LE),
                Attribute::new(&b""[..]).variable_len(NOTIFY_VALUE_LEN as u16),
                Metadata::new(Properties::new().notify()),
            )?
            .build();

        let service = sb.build();

        let handles = ServiceHandles {
            service: service.handle(),
            echo_value: echo.value_handle,
            notify_value: notify.value_handle,
            notify_cccd: notify.cccd_handle,
        };
        debug!("Echo service registered: {}", handles);

        Ok(Self { handles, device })
    }

    pub fn handles(&self) -> ServiceHandles {
        self.handles
    }
}

/// Map a write on the echo service to the event the BLE task acts on.
///
/// CCCD writes become [`EchoServerEvent::NotifyCccdWrite`]. Echo writes at
/// offset 0 that fit the store become [`EchoServerEvent::EchoWrite`]; partial
/// and oversized writes are dropped, leaving the store unchanged.
pub fn classify_write(handles: &ServiceHandles, handle: u16, offset: usize, data: &[u8]) -> Option<EchoServerEvent> {
    if handle == handles.notify_cccd {
        let subscription = Subscription::from_cccd(data);
        debug!("CCCD write on handle {}: {}", handle, subscription);
        return Some(EchoServerEvent::NotifyCccdWrite(subscription));
    }

    if handle == handles.echo_value {
        if offset != 0 {
            warn!("Ignoring echo write at offset {}", offset);
            return None;
        }
        return match StoredValue::from_slice(data) {
            Ok(value) => Some(EchoServerEvent::EchoWrite(value)),
            Err(_) => {
                warn!("Echo write of {} bytes dropped", data.len());
                None
            }
        };
    }

    debug!("Write to unknown handle {} (len: {})", handle, data.len());
    None
}

/// Part of `value` a read at `offset` returns. Reading exactly at the end
/// yields an empty slice.
pub fn read_at(value: &[u8], offset: usize) -> Result<&[u8], GattError> {
    value.get(offset..).ok_or(GattError::ATTERR_INVALID_OFFSET)
}

impl gatt_server::Server for Server {
    type Event = EchoServerEvent;

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        op: WriteOp,
        offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        debug!("Write on handle {} (op: {:?}, offset: {})", handle, op, offset);
        classify_write(&self.handles, handle, offset, data)
    }

    fn on_deferred_read(&self, handle: u16, offset: usize, reply: DeferredReadReply) -> Option<Self::Event> {
        let result = if handle == self.handles.echo_value {
            let echo = self.device.on_read();
            reply.reply(read_at(&echo, offset).map(Some))
        } else {
            // Serve whatever the stack holds for attributes we do not compute
            reply.reply(Ok(None))
        };

        if let Err(e) = result {
            warn!("Read reply on handle {} failed: {:?}", handle, e);
        }
        None
    }
}
