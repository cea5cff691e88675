//! Handlers for caller requests.

use super::controller::Controller;
use super::driver::{StationConfig, WifiDriver};
use super::pending::Responder;
use super::state::{PendingScan, Phase};
use super::ScanResults;
use crate::wifi_config::WifiCredentials;
use crate::{Error, Result};

impl<D: WifiDriver> Controller<D> {
    pub(super) async fn connect(
        &mut self,
        credentials: WifiCredentials,
        responder: Responder<Result<()>>,
    ) {
        if !self.started {
            responder.resolve(Err(Error::NotStarted));
            return;
        }
        #[cfg(feature = "defmt")]
        defmt::info!("WiFi connect requested: {}", credentials.ssid.as_str());

        let current = match self.driver.station_config().await {
            Ok(current) => current,
            Err(err) => {
                self.fail_connect(responder, Error::ConfigRead(err)).await;
                return;
            }
        };

        if self.state.phase == Phase::Connected && current.credentials == credentials {
            #[cfg(feature = "defmt")]
            defmt::info!("Already connected to {}", credentials.ssid.as_str());
            responder.resolve(Ok(()));
            return;
        }

        self.force_disconnect(Error::Superseded).await;

        let config = StationConfig { credentials };
        if let Err(err) = self.driver.set_station_config(&config).await {
            self.fail_connect(responder, Error::ConfigWrite(err)).await;
            return;
        }

        self.state.connection_attempts_used = 0;
        self.state.reconnection_attempts_used = 0;

        if let Err(err) = self.driver.connect().await {
            self.fail_connect(responder, Error::ConnectIssue(err)).await;
            return;
        }

        self.state.pending_connect = Some(responder);
        self.state.phase = Phase::Connecting;
    }

    async fn fail_connect(&mut self, responder: Responder<Result<()>>, error: Error) {
        #[cfg(feature = "defmt")]
        defmt::error!("WiFi connect failed: {}", error);
        self.force_disconnect(Error::Superseded).await;
        responder.resolve(Err(error));
    }

    pub(super) async fn disconnect(&mut self) {
        if self.started {
            self.force_disconnect(Error::Cancelled).await;
        }
        self.state.phase = Phase::Disconnected;
    }

    pub(super) async fn scan(
        &mut self,
        capacity: usize,
        responder: Responder<Result<ScanResults>>,
    ) {
        if !self.started {
            responder.resolve(Err(Error::NotStarted));
            return;
        }

        self.stop_current_scan(Error::Superseded).await;

        if let Err(err) = self.driver.scan_start().await {
            #[cfg(feature = "defmt")]
            defmt::error!("WiFi scan could not start: {}", err);
            responder.resolve(Err(Error::ScanIssue(err)));
            return;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("WiFi scan started (capacity {})", capacity);
        self.state.pending_scan = Some(PendingScan {
            capacity,
            responder,
        });
    }
}
