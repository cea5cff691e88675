//! Turns network link transitions into driver notifications.
//!
//! A driver that learns about association from its network stack (DHCP up, DHCP down) sees
//! the same link-down whether the access point went away or the station left on request.
//! Only the first kind is a disconnection the client should react to.

use portable_atomic::{AtomicBool, Ordering};

use super::driver::{DisconnectReason, DriverEvent, IpInfo};

/// Link tracker shared between a driver's request path and its link-monitoring task.
pub struct LinkWatch {
    up: AtomicBool,
    leaving: AtomicBool,
}

impl LinkWatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            up: AtomicBool::new(false),
            leaving: AtomicBool::new(false),
        }
    }

    /// Record that the station is about to leave its network on request.
    ///
    /// Returns `true` when the link is up, in which case the next link-down is swallowed.
    pub fn expect_leave(&self) -> bool {
        let up = self.up.load(Ordering::Acquire);
        if up {
            self.leaving.store(true, Ordering::Release);
        }
        up
    }

    /// The link came up with `ip_info`.
    pub fn link_up(&self, ip_info: IpInfo) -> DriverEvent {
        self.leaving.store(false, Ordering::Release);
        self.up.store(true, Ordering::Release);
        DriverEvent::Connected(ip_info)
    }

    /// The link went down. `None` when the station left on request.
    pub fn link_down(&self) -> Option<DriverEvent> {
        self.up.store(false, Ordering::Release);
        if self.leaving.swap(false, Ordering::AcqRel) {
            None
        } else {
            Some(DriverEvent::Disconnected(DisconnectReason::BEACON_TIMEOUT))
        }
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }
}

impl Default for LinkWatch {
    fn default() -> Self {
        Self::new()
    }
}
