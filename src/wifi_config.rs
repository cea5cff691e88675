//! Configuration for the WiFi client: credentials, attempt ceilings, and the observer.

use crate::{Error, Result};

/// Maximum SSID length in bytes, matching the driver's station configuration field.
pub const SSID_MAX_LEN: usize = 32;

/// Maximum password length in bytes, matching the driver's station configuration field.
pub const PASSWORD_MAX_LEN: usize = 64;

/// WiFi network credentials (SSID and password).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiCredentials {
    /// Network SSID (up to 32 bytes).
    pub ssid: heapless::String<SSID_MAX_LEN>,
    /// Network password (up to 64 bytes, empty for open networks).
    pub password: heapless::String<PASSWORD_MAX_LEN>,
}

impl WifiCredentials {
    /// Build credentials, checking both fields against the driver's field widths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SsidTooLong`] or [`Error::PasswordTooLong`] when a field does not fit.
    pub fn new(ssid: &str, password: &str) -> Result<Self> {
        let mut credentials = Self::default();
        credentials.ssid.push_str(ssid).map_err(|()| Error::SsidTooLong {
            len: ssid.len(),
            max: SSID_MAX_LEN,
        })?;
        credentials
            .password
            .push_str(password)
            .map_err(|()| Error::PasswordTooLong {
                len: password.len(),
                max: PASSWORD_MAX_LEN,
            })?;
        Ok(credentials)
    }

    /// `true` when no password is set.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

/// Notifications delivered to the configured observer when the link changes on its own.
///
/// These are distinct from the per-request [`Pending`](crate::Pending) outcomes: they report
/// connection loss and recovery that no caller asked for.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiClientEvent {
    /// The established link dropped and a reconnection attempt was issued.
    Reconnecting,
    /// A reconnection attempt succeeded.
    Reconnected,
    /// Reconnection attempts are exhausted; the client is now disconnected.
    Disconnected,
}

/// Radio power-save mode applied when the client starts.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PowerSave {
    /// Radio always on. Lowest latency, highest consumption.
    #[default]
    None,
    /// Wake for every DTIM beacon.
    MinModem,
    /// Sleep as long as the access point allows.
    MaxModem,
}

/// Immutable client configuration, fixed by the first [`WifiClient::init`](crate::WifiClient::init).
#[derive(Clone, Copy)]
pub struct WifiClientConfig {
    /// Retries allowed for a connect request before its handle fails.
    pub connection_attempts: u32,
    /// Retries allowed after an established link drops before giving up.
    pub reconnection_attempts: u32,
    /// Receives [`WifiClientEvent`]s. Runs on the client worker and must not block.
    pub observer: fn(WifiClientEvent),
    /// Power-save mode applied at start.
    pub power_save: PowerSave,
}

impl WifiClientConfig {
    /// Configuration that retries forever and notifies `observer`.
    #[must_use]
    pub const fn new(observer: fn(WifiClientEvent)) -> Self {
        Self {
            connection_attempts: u32::MAX,
            reconnection_attempts: u32::MAX,
            observer,
            power_save: PowerSave::None,
        }
    }

    #[must_use]
    pub const fn with_connection_attempts(mut self, attempts: u32) -> Self {
        self.connection_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_reconnection_attempts(mut self, attempts: u32) -> Self {
        self.reconnection_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_power_save(mut self, power_save: PowerSave) -> Self {
        self.power_save = power_save;
        self
    }
}

impl core::fmt::Debug for WifiClientConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WifiClientConfig")
            .field("connection_attempts", &self.connection_attempts)
            .field("reconnection_attempts", &self.reconnection_attempts)
            .field("power_save", &self.power_save)
            .finish_non_exhaustive()
    }
}
