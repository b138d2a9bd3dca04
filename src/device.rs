//! Peripheral Device State
//!
//! Connection flag, echo store, mirrored subscription and last-notify
//! timestamp for the EchoBLE peripheral. SoftDevice event handlers and the
//! polling loop run in different contexts, so every field sits behind one
//! critical-section mutex and the device is shared by reference.
//!
//! Outbound calls into the BLE stack go through [`HostStack`], which keeps the
//! state machine testable without a radio.

use core::cell::RefCell;
use core::fmt::Write;

use defmt::{debug, info, warn, Format};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::{String, Vec};

use crate::ble::subscription::{Delivery, Subscription};
use crate::config::{
    ECHO_PREFIX, ECHO_VALUE_LEN, MAX_WRITE_LEN, NOTIFY_INTERVAL_MS, NOTIFY_PREFIX, NOTIFY_VALUE_LEN,
};

/// Last value written to the echo characteristic
pub type StoredValue = Vec<u8, MAX_WRITE_LEN>;

/// Value returned to a central reading the echo characteristic
pub type EchoValue = Vec<u8, ECHO_VALUE_LEN>;

/// Notification payload text
pub type NotifyPayload = String<NOTIFY_VALUE_LEN>;

/// Device errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum DeviceError {
    /// Write longer than the stored value capacity
    ValueTooLong { len: usize, max: usize },
}

/// Notification push errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NotifyError {
    /// No connection to push on
    NotConnected,
    /// Stack refused the push
    Rejected,
}

/// Result of one polling-loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum PollOutcome {
    /// Disconnected, or the notify interval has not elapsed
    Idle,
    /// Interval elapsed but the central has not subscribed
    Disabled,
    /// Payload pushed for this tick
    Sent { tick: u64, delivery: Delivery },
    /// Push attempted and refused
    Failed { tick: u64, error: NotifyError },
}

/// Capabilities the device needs from the BLE stack binding
pub trait HostStack {
    /// Make the peripheral connectable again
    fn restart_advertising(&self);

    /// Set the notify characteristic value and push it to the central
    fn push(&self, delivery: Delivery, payload: &[u8]) -> Result<(), NotifyError>;
}

struct DeviceState {
    connected: bool,
    stored: StoredValue,
    subscription: Subscription,
    last_notify_ms: u64,
}

impl DeviceState {
    const fn new() -> Self {
        Self {
            connected: false,
            stored: Vec::new(),
            subscription: Subscription::NONE,
            last_notify_ms: 0,
        }
    }
}

/// The EchoBLE peripheral
pub struct PeripheralDevice {
    state: Mutex<CriticalSectionRawMutex, RefCell<DeviceState>>,
}

impl Default for PeripheralDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralDevice {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(DeviceState::new())),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    /// Central connected
    pub fn on_connect(&self) {
        info!("Client connected");
        self.with_state(|state| state.connected = true);
    }

    /// Central disconnected.
    ///
    /// The stack stops advertising once a link is up, so advertising is
    /// always restarted here. The stored value is kept for the next central;
    /// the subscription is dropped along with the link.
    pub fn on_disconnect<S: HostStack>(&self, stack: &S) {
        info!("Client disconnected");
        self.with_state(|state| {
            state.connected = false;
            state.subscription = Subscription::NONE;
        });
        stack.restart_advertising();
    }

    /// Store a written value verbatim
    pub fn on_write(&self, value: &[u8]) -> Result<(), DeviceError> {
        info!("Echo value written: {=[u8]:a}", value);

        let stored = StoredValue::from_slice(value).map_err(|_| {
            warn!("Echo write of {} bytes exceeds {} byte capacity", value.len(), MAX_WRITE_LEN);
            DeviceError::ValueTooLong {
                len: value.len(),
                max: MAX_WRITE_LEN,
            }
        })?;

        self.with_state(|state| state.stored = stored);
        Ok(())
    }

    /// Compute the echo for a read request from the current stored value.
    ///
    /// Called for every read of the echo characteristic; nothing is cached.
    pub fn on_read(&self) -> EchoValue {
        let echo = self.with_state(|state| echo_value(&state.stored));
        info!("Echo value read: {=[u8]:a}", echo.as_slice());
        echo
    }

    /// CCCD of the notify characteristic changed
    pub fn on_subscription_change(&self, subscription: Subscription) {
        debug!(
            "Subscription: notifications={}, indications={}",
            subscription.notifications, subscription.indications
        );
        self.with_state(|state| state.subscription = subscription);
    }

    pub fn is_connected(&self) -> bool {
        self.with_state(|state| state.connected)
    }

    pub fn subscription(&self) -> Subscription {
        self.with_state(|state| state.subscription)
    }

    pub fn stored_value(&self) -> StoredValue {
        self.with_state(|state| state.stored.clone())
    }

    /// Tick of the most recent notification check that passed the interval gate
    pub fn last_notify_ms(&self) -> u64 {
        self.with_state(|state| state.last_notify_ms)
    }

    /// One iteration of the polling loop at tick `now_ms`.
    ///
    /// Pushes a timestamped payload when connected, subscribed and strictly
    /// more than [`NOTIFY_INTERVAL_MS`] after the previous check. The
    /// timestamp advances even when nobody is subscribed.
    pub fn poll<S: HostStack>(&self, now_ms: u64, stack: &S) -> PollOutcome {
        let subscription = self.with_state(|state| {
            if !state.connected || now_ms.saturating_sub(state.last_notify_ms) <= NOTIFY_INTERVAL_MS {
                return None;
            }
            state.last_notify_ms = now_ms;
            Some(state.subscription)
        });

        let Some(subscription) = subscription else {
            return PollOutcome::Idle;
        };

        let Some(delivery) = subscription.delivery() else {
            info!("Notifications and indications are disabled");
            return PollOutcome::Disabled;
        };

        info!("Notifications or indications are enabled");
        let payload = notification_payload(now_ms);
        match stack.push(delivery, payload.as_bytes()) {
            Ok(()) => {
                debug!("Pushed {=str} ({})", payload.as_str(), delivery);
                PollOutcome::Sent { tick: now_ms, delivery }
            }
            Err(error) => {
                warn!("Notification push failed: {}", error);
                PollOutcome::Failed { tick: now_ms, error }
            }
        }
    }
}

fn echo_value(stored: &[u8]) -> EchoValue {
    let mut echo = EchoValue::new();
    // Capacity is prefix plus the stored capacity, so both halves fit
    let _ = echo.extend_from_slice(ECHO_PREFIX);
    let _ = echo.extend_from_slice(stored);
    echo
}

/// `"Notification data "` followed by the decimal tick count
pub fn notification_payload(tick: u64) -> NotifyPayload {
    let mut payload = NotifyPayload::new();
    // u64::MAX has 20 digits, which the capacity accounts for
    let _ = write!(payload, "{}{}", NOTIFY_PREFIX, tick);
    payload
}
