//! Common test utilities and setup for embedded tests
//!
//! This module provides shared functionality for all defmt-test based tests:
//! - Global logger, panic handler and time driver
//! - Heap for proptest
//! - A recording `HostStack` stand-in

#![allow(dead_code)]

// Re-export commonly used items for tests (except conflicting macros)
pub use defmt_rtt as _; // global logger
// Also need the same embassy dependencies as the main firmware
pub use embassy_executor as _;
// Use nrf-softdevice which provides both interrupt vectors and critical section
pub use nrf_softdevice as _;
pub use panic_probe as _; // panic handler
pub use {embassy_nrf as _, embassy_sync as _, embassy_time as _};

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, Ordering};

use echo_ble_firmware::ble::advertising;
use echo_ble_firmware::ble::subscription::{Delivery, Subscription};
use echo_ble_firmware::config::NOTIFY_VALUE_LEN;
use echo_ble_firmware::device::{HostStack, NotifyError, PeripheralDevice};
// Global allocator for proptest (required for alloc feature in no_std)
pub use embedded_alloc::LlffHeap as Heap;

#[global_allocator]
pub static HEAP: Heap = Heap::empty();

// Define the global allocator backing store - 8KB heap for more complex tests
pub static mut HEAP_MEM: [u8; 8192] = [0; 8192];

// Global flag to ensure heap is only initialized once
static HEAP_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Ensure heap is initialized exactly once (thread-safe)
pub fn ensure_heap_initialized() {
    if !HEAP_INITIALIZED.swap(true, Ordering::Relaxed) {
        unsafe {
            let ptr = core::ptr::addr_of_mut!(HEAP_MEM) as *mut u8;
            HEAP.init(ptr as usize, 8192);
        }
    }
}

/// Maximum pushes a `MockStack` records
pub const MAX_RECORDED_PUSHES: usize = 16;

/// One push seen by the mock stack
#[derive(Clone)]
pub struct RecordedPush {
    pub delivery: Delivery,
    pub payload: heapless::Vec<u8, NOTIFY_VALUE_LEN>,
}

/// `HostStack` that records everything the device asks of it
pub struct MockStack {
    pushes: RefCell<heapless::Vec<RecordedPush, MAX_RECORDED_PUSHES>>,
    restarts: Cell<u32>,
    reject_pushes: Cell<bool>,
}

impl MockStack {
    pub const fn new() -> Self {
        Self {
            pushes: RefCell::new(heapless::Vec::new()),
            restarts: Cell::new(0),
            reject_pushes: Cell::new(false),
        }
    }

    /// Make every following push fail with `NotifyError::Rejected`
    pub fn reject_pushes(&self, reject: bool) {
        self.reject_pushes.set(reject);
    }

    pub fn push_count(&self) -> usize {
        self.pushes.borrow().len()
    }

    pub fn push_at(&self, index: usize) -> RecordedPush {
        self.pushes.borrow()[index].clone()
    }

    pub fn restart_count(&self) -> u32 {
        self.restarts.get()
    }
}

impl HostStack for MockStack {
    fn restart_advertising(&self) {
        self.restarts.set(self.restarts.get() + 1);
    }

    fn push(&self, delivery: Delivery, payload: &[u8]) -> Result<(), NotifyError> {
        if self.reject_pushes.get() {
            return Err(NotifyError::Rejected);
        }
        let mut recorded = heapless::Vec::new();
        recorded.extend_from_slice(payload).unwrap();
        let _ = self.pushes.borrow_mut().push(RecordedPush {
            delivery,
            payload: recorded,
        });
        Ok(())
    }
}

/// Notifications enabled through the CCCD
pub const NOTIFY_ON: Subscription = Subscription {
    notifications: true,
    indications: false,
};

/// Device with a central connected and notifications enabled
pub fn subscribed_device() -> PeripheralDevice {
    let device = PeripheralDevice::new();
    device.on_connect();
    device.on_subscription_change(NOTIFY_ON);
    device
}

/// Parse the tick count out of a notification payload
pub fn payload_tick(payload: &[u8]) -> Option<u64> {
    let prefix = echo_ble_firmware::config::NOTIFY_PREFIX.as_bytes();
    if !payload.starts_with(prefix) {
        return None;
    }
    let digits = core::str::from_utf8(&payload[prefix.len()..]).ok()?;
    digits.parse().ok()
}

/// Consume a pending advertising request, returning whether there was one
pub fn take_advertising_request() -> bool {
    let pending = embassy_futures::select::select(advertising::wait_for_request(), core::future::ready(()));
    matches!(
        embassy_futures::block_on(pending),
        embassy_futures::select::Either::First(())
    )
}
