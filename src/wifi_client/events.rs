//! Handlers for driver notifications.

use heapless::Vec;

use super::controller::Controller;
use super::driver::{ApRecord, AuthMode, DisconnectReason, IpInfo, WifiDriver};
use super::state::Phase;
use super::{AccessPoint, MAX_SCAN_RESULTS, ScanResults};
use crate::wifi_config::{SSID_MAX_LEN, WifiClientEvent};
use crate::{Error, Result};

impl<D: WifiDriver> Controller<D> {
    pub(super) fn on_connected(&mut self, ip_info: IpInfo) {
        let prior = self.state.phase;
        if prior == Phase::Disconnected {
            #[cfg(feature = "defmt")]
            defmt::debug!("Stale connected notification ignored");
            return;
        }

        if let Some(responder) = self.state.pending_connect.take() {
            responder.resolve(Ok(()));
        }
        self.state.reconnection_attempts_used = 0;
        self.state.ip_info = Some(ip_info);
        self.state.phase = Phase::Connected;
        #[cfg(feature = "defmt")]
        defmt::info!("WiFi connected, IP {}", ip_info);

        if prior == Phase::Reconnecting {
            self.notify(WifiClientEvent::Reconnected);
        }
    }

    pub(super) async fn on_disconnected(&mut self, _reason: DisconnectReason) {
        if self.state.phase == Phase::Disconnected {
            #[cfg(feature = "defmt")]
            defmt::debug!("Stale disconnected notification ignored ({})", _reason.label());
            return;
        }
        #[cfg(feature = "defmt")]
        defmt::warn!("WiFi disconnected: {} ({})", _reason.label(), _reason.0);

        if self.state.pending_connect.is_some() {
            let attempts = self.state.connection_attempts_used;
            if attempts > self.config.connection_attempts {
                #[cfg(feature = "defmt")]
                defmt::error!("Maximum connection attempts reached ({})", attempts);
                self.force_disconnect(Error::ConnectAttemptsExhausted { attempts })
                    .await;
                return;
            }
            self.state.connection_attempts_used = attempts.saturating_add(1);
            #[cfg(feature = "defmt")]
            defmt::info!(
                "Retrying connection (attempt {})",
                self.state.connection_attempts_used
            );
            if let Err(err) = self.driver.connect().await {
                self.force_disconnect(Error::ConnectIssue(err)).await;
            }
            return;
        }

        let attempts = self.state.reconnection_attempts_used;
        if attempts > self.config.reconnection_attempts {
            #[cfg(feature = "defmt")]
            defmt::error!("Maximum reconnection attempts reached ({})", attempts);
            self.force_disconnect(Error::Cancelled).await;
            self.notify(WifiClientEvent::Disconnected);
            return;
        }
        self.state.reconnection_attempts_used = attempts.saturating_add(1);
        #[cfg(feature = "defmt")]
        defmt::info!(
            "Reconnecting (attempt {})",
            self.state.reconnection_attempts_used
        );
        if let Err(_err) = self.driver.connect().await {
            #[cfg(feature = "defmt")]
            defmt::error!("WiFi reconnect could not start: {}", _err);
            self.force_disconnect(Error::Cancelled).await;
            self.notify(WifiClientEvent::Disconnected);
            return;
        }
        self.state.phase = Phase::Reconnecting;
        self.notify(WifiClientEvent::Reconnecting);
    }

    pub(super) async fn on_scan_done(&mut self) {
        let Some(scan) = self.state.pending_scan.take() else {
            #[cfg(feature = "defmt")]
            defmt::debug!("Scan results with no pending scan discarded");
            self.discard_scan_records().await;
            return;
        };
        let result = self.collect_scan_results(scan.capacity).await;
        #[cfg(feature = "defmt")]
        match &result {
            Ok(found) => defmt::info!("WiFi scan found {} access points", found.len()),
            Err(err) => defmt::error!("WiFi scan failed: {}", err),
        }
        scan.responder.resolve(result);
    }

    async fn collect_scan_results(&mut self, capacity: usize) -> Result<ScanResults> {
        if capacity > MAX_SCAN_RESULTS {
            self.discard_scan_records().await;
            return Err(Error::ScanAllocation {
                requested: capacity,
                available: MAX_SCAN_RESULTS,
            });
        }
        let mut records: Vec<ApRecord, MAX_SCAN_RESULTS> = Vec::new();
        self.driver
            .scan_records(&mut records, capacity)
            .await
            .map_err(Error::ScanRecords)?;
        Ok(records.iter().take(capacity).map(access_point).collect())
    }
}

/// Translate a raw driver record into the caller-facing form.
fn access_point(record: &ApRecord) -> AccessPoint {
    AccessPoint {
        ssid: ssid_text(&record.ssid),
        strength: strength(record.rssi),
        open: record.auth == AuthMode::Open,
    }
}

/// Normalize RSSI so -127 dBm maps to 0.0 and 0 dBm (or stronger) to 1.0.
fn strength(rssi: i8) -> f32 {
    let above_floor = i16::from(rssi.clamp(-127, 0)).saturating_add(127);
    f32::from(above_floor) / 127.0
}

/// Longest valid UTF-8 prefix of the broadcast SSID.
fn ssid_text(bytes: &[u8]) -> heapless::String<SSID_MAX_LEN> {
    let valid = match core::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => core::str::from_utf8(bytes.get(..err.valid_up_to()).unwrap_or_default())
            .unwrap_or_default(),
    };
    let mut ssid = heapless::String::new();
    // Records never exceed SSID_MAX_LEN bytes, so this cannot fail.
    let _ = ssid.push_str(valid);
    ssid
}
