#![no_std]
#![no_main]

mod common;

use echo_ble_firmware::ble::subscription::{Delivery, Subscription};
use echo_ble_firmware::config::NOTIFY_INTERVAL_MS;
use echo_ble_firmware::device::{notification_payload, NotifyError, PeripheralDevice, PollOutcome};

#[defmt_test::tests]
mod tests {
    use defmt::{assert, assert_eq};

    use super::*;
    use crate::common::*;

    #[init]
    fn init() {
        ensure_heap_initialized();
    }

    #[test]
    fn test_no_notification_while_disconnected() {
        let stack = MockStack::new();
        let device = PeripheralDevice::new();
        device.on_subscription_change(NOTIFY_ON);

        for now in [0, 3001, 10_000, 100_000] {
            assert_eq!(device.poll(now, &stack), PollOutcome::Idle);
        }

        assert_eq!(stack.push_count(), 0);
        assert_eq!(device.last_notify_ms(), 0);
    }

    #[test]
    fn test_first_notification_needs_interval_to_elapse() {
        let stack = MockStack::new();
        let device = subscribed_device();

        assert_eq!(device.poll(NOTIFY_INTERVAL_MS, &stack), PollOutcome::Idle);
        assert_eq!(
            device.poll(NOTIFY_INTERVAL_MS + 1, &stack),
            PollOutcome::Sent {
                tick: NOTIFY_INTERVAL_MS + 1,
                delivery: Delivery::Notify,
            }
        );

        assert_eq!(stack.push_count(), 1);
        assert_eq!(stack.push_at(0).payload.as_slice(), b"Notification data 3001".as_slice());
    }

    #[test]
    fn test_interval_is_exclusive() {
        let stack = MockStack::new();
        let device = subscribed_device();

        assert!(matches!(device.poll(3001, &stack), PollOutcome::Sent { .. }));
        // Exactly 3000 ticks later is still too early
        assert_eq!(device.poll(6001, &stack), PollOutcome::Idle);
        assert!(matches!(device.poll(6002, &stack), PollOutcome::Sent { tick: 6002, .. }));

        assert_eq!(stack.push_count(), 2);
    }

    #[test]
    fn test_two_waits_give_two_increasing_notifications() {
        let stack = MockStack::new();
        let device = subscribed_device();

        assert!(matches!(device.poll(3500, &stack), PollOutcome::Sent { .. }));
        assert!(matches!(device.poll(7000, &stack), PollOutcome::Sent { .. }));

        assert_eq!(stack.push_count(), 2);
        let first = stack.push_at(0);
        let second = stack.push_at(1);
        assert!(first.payload != second.payload);

        let first_tick = payload_tick(&first.payload).unwrap();
        let second_tick = payload_tick(&second.payload).unwrap();
        assert_eq!(first_tick, 3500);
        assert_eq!(second_tick, 7000);
        assert!(second_tick > first_tick);
    }

    #[test]
    fn test_unsubscribed_reports_disabled() {
        let stack = MockStack::new();
        let device = PeripheralDevice::new();
        device.on_connect();

        assert_eq!(device.poll(3001, &stack), PollOutcome::Disabled);
        assert_eq!(stack.push_count(), 0);
        // The timestamp advances even without a subscriber
        assert_eq!(device.last_notify_ms(), 3001);
        assert_eq!(device.poll(5000, &stack), PollOutcome::Idle);
    }

    #[test]
    fn test_gate_holds_for_mixed_connection_and_subscription() {
        let stack = MockStack::new();
        let device = PeripheralDevice::new();
        let mut last_sent: Option<u64> = None;

        let mut now = 0u64;
        let mut step = 0u32;
        while now < 60_000 {
            // Vary link and CCCD state on a fixed pattern
            match step % 23 {
                0 => device.on_connect(),
                5 => device.on_subscription_change(NOTIFY_ON),
                11 => device.on_subscription_change(Subscription::NONE),
                13 => device.on_subscription_change(NOTIFY_ON),
                19 => device.on_disconnect(&stack),
                _ => {}
            }

            let connected = device.is_connected();
            match device.poll(now, &stack) {
                PollOutcome::Sent { tick, .. } => {
                    assert!(connected);
                    if let Some(previous) = last_sent {
                        assert!(tick - previous > NOTIFY_INTERVAL_MS);
                    }
                    last_sent = Some(tick);
                }
                PollOutcome::Disabled => assert!(connected),
                PollOutcome::Idle => {}
                PollOutcome::Failed { error, .. } => defmt::panic!("unexpected push failure: {}", error),
            }

            now += 250;
            step += 1;
        }

        assert!(stack.push_count() > 0);
    }

    #[test]
    fn test_indication_used_when_only_indications_enabled() {
        let stack = MockStack::new();
        let device = PeripheralDevice::new();
        device.on_connect();
        device.on_subscription_change(Subscription::from_cccd(&[0x02, 0x00]));

        assert_eq!(
            device.poll(4000, &stack),
            PollOutcome::Sent {
                tick: 4000,
                delivery: Delivery::Indicate,
            }
        );
        assert_eq!(stack.push_at(0).delivery, Delivery::Indicate);
    }

    #[test]
    fn test_rejected_push_is_reported_not_fatal() {
        let stack = MockStack::new();
        let device = subscribed_device();
        stack.reject_pushes(true);

        assert_eq!(
            device.poll(3001, &stack),
            PollOutcome::Failed {
                tick: 3001,
                error: NotifyError::Rejected,
            }
        );
        assert_eq!(device.poll(4000, &stack), PollOutcome::Idle);

        stack.reject_pushes(false);
        assert!(matches!(device.poll(6002, &stack), PollOutcome::Sent { .. }));
        assert_eq!(stack.push_count(), 1);
    }

    #[test]
    fn test_cccd_decoding() {
        assert_eq!(Subscription::from_cccd(&[]), Subscription::NONE);
        assert_eq!(Subscription::from_cccd(&[0x00, 0x00]), Subscription::NONE);

        let notify = Subscription::from_cccd(&[0x01, 0x00]);
        assert!(notify.notifications && !notify.indications);
        assert_eq!(notify.delivery(), Some(Delivery::Notify));

        let both = Subscription::from_cccd(&[0x03, 0x00]);
        assert!(both.is_active());
        assert_eq!(both.delivery(), Some(Delivery::Notify));

        assert!(!Subscription::NONE.is_active());
        assert_eq!(Subscription::NONE.delivery(), None);
    }

    #[test]
    fn test_notification_payload_format() {
        assert_eq!(notification_payload(0).as_str(), "Notification data 0");
        assert_eq!(notification_payload(123_456).as_str(), "Notification data 123456");
        assert_eq!(
            notification_payload(u64::MAX).as_str(),
            "Notification data 18446744073709551615"
        );
    }
}
