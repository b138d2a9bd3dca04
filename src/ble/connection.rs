//! Connection Management
//!
//! Holds the single active SoftDevice connection so the polling loop can push
//! notifications on it, and implements [`HostStack`] on top of it.

use core::cell::RefCell;

use defmt::{debug, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::ble::Connection;

use crate::ble::advertising;
use crate::ble::subscription::Delivery;
use crate::device::{HostStack, NotifyError};

/// SoftDevice side of the peripheral: the active link plus the notify
/// characteristic it pushes to
pub struct SoftdeviceLink {
    notify_handle: u16,
    conn: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>>,
}

impl SoftdeviceLink {
    pub const fn new(notify_handle: u16) -> Self {
        Self {
            notify_handle,
            conn: Mutex::new(RefCell::new(None)),
        }
    }

    /// Record the link accepted by the advertiser
    pub fn attach(&self, conn: &Connection) {
        debug!("CONNECTION: Attached handle {:?}", conn.handle());
        self.conn.lock(|c| *c.borrow_mut() = Some(conn.clone()));
    }

    /// Forget the link after the GATT server loop ends
    pub fn detach(&self) {
        if self.conn.lock(|c| c.borrow_mut().take()).is_some() {
            debug!("CONNECTION: Detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.conn.lock(|c| c.borrow().is_some())
    }
}

impl HostStack for SoftdeviceLink {
    fn restart_advertising(&self) {
        advertising::request_advertising();
    }

    fn push(&self, delivery: Delivery, payload: &[u8]) -> Result<(), NotifyError> {
        let conn = self
            .conn
            .lock(|c| c.borrow().clone())
            .ok_or(NotifyError::NotConnected)?;

        // hvx also stores the payload as the characteristic value
        let result = match delivery {
            Delivery::Notify => gatt_server::notify_value(&conn, self.notify_handle, payload)
                .map_err(|e| warn!("Notify rejected: {:?}", defmt::Debug2Format(&e))),
            Delivery::Indicate => gatt_server::indicate_value(&conn, self.notify_handle, payload)
                .map_err(|e| warn!("Indicate rejected: {:?}", defmt::Debug2Format(&e))),
        };

        result.map_err(|()| NotifyError::Rejected)
    }
}
