use super::ScanResults;
use super::driver::IpInfo;
use super::pending::Responder;
use crate::Result;

/// Association phase of the station.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Disconnected,
    /// A connect request is waiting for its first association.
    Connecting,
    Connected,
    /// An established link dropped and the client is retrying on its own.
    Reconnecting,
}

/// Snapshot of the client returned by [`WifiClient::status`](crate::WifiClient::status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiStatus {
    pub phase: Phase,
    /// Address from the most recent successful association, if any.
    pub ip_info: Option<IpInfo>,
    pub connection_attempts_used: u32,
    pub reconnection_attempts_used: u32,
    /// `true` while a scan request is waiting for its results.
    pub scanning: bool,
}

pub(crate) struct PendingScan {
    pub(crate) capacity: usize,
    pub(crate) responder: Responder<Result<ScanResults>>,
}

/// Everything the worker mutates. Never shared outside the controller.
#[derive(Default)]
pub(crate) struct ConnectionState {
    pub(crate) phase: Phase,
    pub(crate) pending_connect: Option<Responder<Result<()>>>,
    pub(crate) pending_scan: Option<PendingScan>,
    pub(crate) connection_attempts_used: u32,
    pub(crate) reconnection_attempts_used: u32,
    pub(crate) ip_info: Option<IpInfo>,
}

impl ConnectionState {
    pub(crate) const fn status(&self) -> WifiStatus {
        WifiStatus {
            phase: self.phase,
            ip_info: self.ip_info,
            connection_attempts_used: self.connection_attempts_used,
            reconnection_attempts_used: self.reconnection_attempts_used,
            scanning: self.pending_scan.is_some(),
        }
    }
}
