//! The radio driver boundary: the calls the controller makes and the notifications it receives.

#![allow(async_fn_in_trait, reason = "single-threaded executor; driver futures need not be Send")]

use core::net::Ipv4Addr;

use crate::error::DriverError;
use crate::wifi_config::{PowerSave, SSID_MAX_LEN, WifiCredentials};

use super::{Command, CommandQueue};

/// Station configuration as stored by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationConfig {
    /// Credentials the next connect call will use.
    pub credentials: WifiCredentials,
}

/// Address assignment observed when the station obtained an IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpInfo {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

#[cfg(feature = "defmt")]
impl defmt::Format for IpInfo {
    fn format(&self, f: defmt::Formatter<'_>) {
        let [a, b, c, d] = self.address.octets();
        let [g0, g1, g2, g3] = self.gateway.octets();
        defmt::write!(f, "{}.{}.{}.{} via {}.{}.{}.{}", a, b, c, d, g0, g1, g2, g3);
    }
}

/// Authentication required by an access point.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    Open,
    Wep,
    WpaPersonal,
    Wpa2Personal,
    Wpa3Personal,
    Enterprise,
}

/// One raw access point record as reported by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApRecord {
    /// SSID bytes as broadcast; not guaranteed to be UTF-8.
    pub ssid: heapless::Vec<u8, SSID_MAX_LEN>,
    /// Received signal strength in dBm.
    pub rssi: i8,
    pub auth: AuthMode,
}

/// Reason code attached to a disconnection notification.
///
/// Values below 200 are IEEE 802.11 reason codes; 200 and above are driver-specific.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectReason(pub u8);

impl DisconnectReason {
    pub const UNSPECIFIED: Self = Self(1);
    pub const AUTH_EXPIRE: Self = Self(2);
    pub const AUTH_LEAVE: Self = Self(3);
    pub const ASSOC_EXPIRE: Self = Self(4);
    pub const ASSOC_TOO_MANY: Self = Self(5);
    pub const ASSOC_LEAVE: Self = Self(8);
    pub const MIC_FAILURE: Self = Self(14);
    pub const FOUR_WAY_HANDSHAKE_TIMEOUT: Self = Self(15);
    pub const BEACON_TIMEOUT: Self = Self(200);
    pub const NO_AP_FOUND: Self = Self(201);
    pub const AUTH_FAIL: Self = Self(202);
    pub const ASSOC_FAIL: Self = Self(203);
    pub const HANDSHAKE_TIMEOUT: Self = Self(204);
    pub const CONNECTION_FAIL: Self = Self(205);

    /// Short stable label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.0 {
            1 => "unspecified",
            2 => "auth_expire",
            3 => "auth_leave",
            4 => "assoc_expire",
            5 => "assoc_too_many",
            6 => "not_authed",
            7 => "not_assoced",
            8 => "assoc_leave",
            9 => "assoc_not_authed",
            13 => "ie_invalid",
            14 => "mic_failure",
            15 => "4way_handshake_timeout",
            16 => "group_key_update_timeout",
            23 => "802_1x_auth_failed",
            200 => "beacon_timeout",
            201 => "no_ap_found",
            202 => "auth_fail",
            203 => "assoc_fail",
            204 => "handshake_timeout",
            205 => "connection_fail",
            _ => "other",
        }
    }
}

/// Notifications the driver delivers from outside the client worker.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// The station associated and obtained an address.
    Connected(IpInfo),
    /// The station lost or failed to establish its association.
    Disconnected(DisconnectReason),
    /// A scan finished; records are waiting in the driver.
    ScanDone,
}

/// Handle given to the driver on subscribe, used to post [`DriverEvent`]s to the worker.
///
/// Posting never blocks and never touches client state, so it is safe from interrupt
/// handlers and from other executors.
#[derive(Clone, Copy)]
pub struct DriverEventSink {
    queue: &'static CommandQueue,
}

impl DriverEventSink {
    pub(crate) const fn new(queue: &'static CommandQueue) -> Self {
        Self { queue }
    }

    /// Queue `event` for the worker. Returns `false` (and drops the event) when the queue is full.
    pub fn notify(&self, event: DriverEvent) -> bool {
        match self.queue.try_send(Command::Driver(event)) {
            Ok(()) => true,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::error!("WiFi client queue full, dropping driver event {}", event);
                false
            }
        }
    }
}

/// The radio calls the controller relies on.
///
/// Every call reports success or failure and the controller checks each one. Calls that
/// start work (`connect`, `scan_start`) only issue it; completion arrives later as a
/// [`DriverEvent`] through the [`DriverEventSink`] handed over in [`subscribe`](Self::subscribe).
pub trait WifiDriver {
    async fn create_interface(&mut self) -> Result<(), DriverError>;
    async fn destroy_interface(&mut self);

    async fn init_radio(&mut self) -> Result<(), DriverError>;
    async fn deinit_radio(&mut self);

    async fn set_station_mode(&mut self) -> Result<(), DriverError>;
    async fn set_power_save(&mut self, power_save: PowerSave) -> Result<(), DriverError>;

    async fn start_radio(&mut self) -> Result<(), DriverError>;
    async fn stop_radio(&mut self);

    async fn subscribe(&mut self, sink: DriverEventSink) -> Result<(), DriverError>;
    async fn unsubscribe(&mut self);

    async fn station_config(&mut self) -> Result<StationConfig, DriverError>;
    async fn set_station_config(&mut self, config: &StationConfig) -> Result<(), DriverError>;

    async fn connect(&mut self) -> Result<(), DriverError>;
    async fn disconnect(&mut self) -> Result<(), DriverError>;

    async fn scan_start(&mut self) -> Result<(), DriverError>;
    async fn scan_stop(&mut self) -> Result<(), DriverError>;

    /// Move up to `limit` records from the last scan into `records`.
    ///
    /// Every call releases the driver's result list, including records beyond `limit`.
    /// A call with `limit == 0` just discards them.
    async fn scan_records<const N: usize>(
        &mut self,
        records: &mut heapless::Vec<ApRecord, N>,
        limit: usize,
    ) -> Result<(), DriverError>;
}
