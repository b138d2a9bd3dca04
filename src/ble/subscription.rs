//! Client Characteristic Configuration tracking
//!
//! Mirrors the CCCD of the notify characteristic so the polling loop can
//! decide whether, and how, to push an update.

use defmt::Format;

/// CCCD bit enabling notifications
pub const CCCD_NOTIFY: u8 = 0x01;
/// CCCD bit enabling indications
pub const CCCD_INDICATE: u8 = 0x02;

/// How an unsolicited update reaches the central
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum Delivery {
    /// Unacknowledged push
    Notify,
    /// Push the central must confirm
    Indicate,
}

/// Subscription state written by the central
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Format)]
pub struct Subscription {
    pub notifications: bool,
    pub indications: bool,
}

impl Subscription {
    /// No delivery requested
    pub const NONE: Self = Self {
        notifications: false,
        indications: false,
    };

    /// Decode a CCCD write. Only the low byte carries flags; an empty write
    /// disables both.
    pub fn from_cccd(data: &[u8]) -> Self {
        let flags = data.first().copied().unwrap_or(0);
        Self {
            notifications: flags & CCCD_NOTIFY != 0,
            indications: flags & CCCD_INDICATE != 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.notifications || self.indications
    }

    /// Preferred delivery mode; notifications win when both are enabled.
    pub fn delivery(&self) -> Option<Delivery> {
        if self.notifications {
            Some(Delivery::Notify)
        } else if self.indications {
            Some(Delivery::Indicate)
        } else {
            None
        }
    }
}
