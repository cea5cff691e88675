//! A WiFi station client that serializes requests against radio notifications.
//!
//! Callers issue requests through a [`WifiClient`] handle. Each request is queued for a single
//! worker, the [`Controller`], which owns the radio driver and the connection state and handles
//! one command at a time. Radio notifications reach the same queue through a
//! [`DriverEventSink`], so every state change happens in enqueue order on the worker.
//!
//! Every request returns a [`Pending`] handle that resolves exactly once. Await it, poll it, or
//! drop it; the worker never waits on the caller.
//!
//! # Example
//!
//! ```no_run
//! use embassy_futures::select::{Either, select};
//! use wifi_client::{Result, WifiClient, WifiClientConfig, WifiClientStatic, WifiDriver};
//!
//! static WIFI_CLIENT: WifiClientStatic = WifiClient::new_static();
//!
//! async fn example(driver: impl WifiDriver) -> Result<()> {
//!     let config = WifiClientConfig::new(|_event| {}).with_connection_attempts(5);
//!     let (client, controller) = WifiClient::init(&WIFI_CLIENT, config, driver);
//!     let Some(controller) = controller else {
//!         return Ok(()); // already initialized elsewhere
//!     };
//!
//!     let session = async {
//!         client.start()?.wait().await?;
//!         for access_point in client.scan(8)?.wait().await? {
//!             let _ = (access_point.ssid, access_point.strength, access_point.open);
//!         }
//!         client.connect("home", "secret")?.wait().await?;
//!         client.disconnect()?.wait().await;
//!         client.stop()?.wait().await;
//!         Ok::<_, wifi_client::Error>(())
//!     };
//!
//!     // In firmware the controller runs on its own task; here the two share one future.
//!     match select(controller.run(), session).await {
//!         Either::First(never) => never,
//!         Either::Second(result) => result,
//!     }
//! }
//! ```

#![allow(clippy::future_not_send, reason = "single-threaded")]

mod controller;
mod driver;
mod events;
mod link;
mod pending;
mod requests;
mod state;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, Ordering};

use crate::wifi_config::{SSID_MAX_LEN, WifiClientConfig, WifiClientEvent, WifiCredentials};
use crate::{Error, Result};

pub use controller::Controller;
pub use driver::{
    ApRecord, AuthMode, DisconnectReason, DriverEvent, DriverEventSink, IpInfo, StationConfig,
    WifiDriver,
};
pub use link::LinkWatch;
pub use pending::{Outcome, Pending, REPLY_SLOT_COUNT, Reply};
pub use state::{Phase, WifiStatus};

use pending::{ReplySlots, Responder};

/// Queue entries kept for driver notifications beyond what callers can occupy.
pub const DRIVER_EVENT_HEADROOM: usize = 8;

/// Depth of the command queue shared by callers and the driver.
///
/// Every queued request holds a reply slot, so callers never occupy more than
/// [`REPLY_SLOT_COUNT`] entries and at least [`DRIVER_EVENT_HEADROOM`] stay free for the driver.
pub const COMMAND_QUEUE_DEPTH: usize = REPLY_SLOT_COUNT + DRIVER_EVENT_HEADROOM;

/// Largest number of access points a single scan can return.
pub const MAX_SCAN_RESULTS: usize = 16;

/// One access point found by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPoint {
    pub ssid: heapless::String<SSID_MAX_LEN>,
    /// Signal strength normalized to `0.0..=1.0` (-127 dBm to 0 dBm).
    pub strength: f32,
    /// `true` when the access point requires no authentication.
    pub open: bool,
}

/// Scan results; the length is the number of access points found.
pub type ScanResults = heapless::Vec<AccessPoint, MAX_SCAN_RESULTS>;

pub(crate) type CommandQueue = Channel<CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH>;

/// Work items processed by the [`Controller`].
pub(crate) enum Command {
    Start(Responder<Result<()>>),
    Stop(Responder<()>),
    Connect {
        credentials: WifiCredentials,
        responder: Responder<Result<()>>,
    },
    Disconnect(Responder<()>),
    Scan {
        capacity: usize,
        responder: Responder<Result<ScanResults>>,
    },
    Status(Responder<Result<WifiStatus>>),
    Driver(DriverEvent),
}

/// Static resources for the WiFi client.
///
/// Create one with [`WifiClient::new_static`] in a `static` and pass it to [`WifiClient::init`].
pub struct WifiClientStatic {
    commands: CommandQueue,
    replies: ReplySlots,
    events: Signal<CriticalSectionRawMutex, WifiClientEvent>,
    initialized: AtomicBool,
}

impl WifiClientStatic {
    /// Reply slots not held by any outstanding request.
    #[must_use]
    pub fn free_reply_slots(&self) -> usize {
        self.replies.free_count()
    }
}

/// Handle for issuing requests to the WiFi client. Cheap to copy.
///
/// See the [module-level documentation](crate::wifi_client) for usage.
#[derive(Clone, Copy)]
pub struct WifiClient {
    resources: &'static WifiClientStatic,
}

impl WifiClient {
    /// Create the static resources for the client.
    #[must_use]
    pub const fn new_static() -> WifiClientStatic {
        WifiClientStatic {
            commands: Channel::new(),
            replies: ReplySlots::new(),
            events: Signal::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Bind `resources` to `config` and `driver`.
    ///
    /// The first call returns the [`Controller`], which must be run (usually on its own task)
    /// for any request to make progress. Later calls keep the first configuration, drop
    /// `driver`, and return only a handle to the existing client.
    pub fn init<D: WifiDriver>(
        resources: &'static WifiClientStatic,
        config: WifiClientConfig,
        driver: D,
    ) -> (Self, Option<Controller<D>>) {
        let client = Self { resources };
        if resources
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            #[cfg(feature = "defmt")]
            defmt::warn!("WiFi client already initialized; keeping the first configuration");
            return (client, None);
        }
        #[cfg(feature = "defmt")]
        defmt::info!(
            "WiFi client initialized (connection attempts {}, reconnection attempts {})",
            config.connection_attempts,
            config.reconnection_attempts
        );
        (client, Some(Controller::new(resources, config, driver)))
    }

    /// Bring the radio up in station mode.
    ///
    /// The handle resolves with [`Error::Initialization`] if any step fails (every completed
    /// step is rolled back) or [`Error::AlreadyStarted`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] or [`Error::ReplySlotsExhausted`] when the request cannot
    /// be queued.
    pub fn start(self) -> Result<Pending<Result<()>>> {
        self.issue(Command::Start)
    }

    /// Cancel any scan and connection, then shut the radio down. Safe in every state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] or [`Error::ReplySlotsExhausted`] when the request cannot
    /// be queued.
    pub fn stop(self) -> Result<Pending<()>> {
        self.issue(Command::Stop)
    }

    /// Connect to `ssid`, replacing any connection or connect request in progress.
    ///
    /// Oversized credentials produce an already-resolved handle and queue nothing. A connect
    /// to the network the client is already connected to with the same password resolves
    /// without touching the radio.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] or [`Error::ReplySlotsExhausted`] when the request cannot
    /// be queued.
    pub fn connect(self, ssid: &str, password: &str) -> Result<Pending<Result<()>>> {
        match WifiCredentials::new(ssid, password) {
            Ok(credentials) => self.issue(|responder| Command::Connect {
                credentials,
                responder,
            }),
            Err(err) => Ok(Pending::ready(Err(err))),
        }
    }

    /// Drop the current connection (or connect attempt). Always resolves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] or [`Error::ReplySlotsExhausted`] when the request cannot
    /// be queued.
    pub fn disconnect(self) -> Result<Pending<()>> {
        self.issue(Command::Disconnect)
    }

    /// Scan for access points, returning at most `capacity` of them.
    ///
    /// A scan already in flight is cancelled and its handle fails with
    /// [`Error::Superseded`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] or [`Error::ReplySlotsExhausted`] when the request cannot
    /// be queued.
    pub fn scan(self, capacity: usize) -> Result<Pending<Result<ScanResults>>> {
        self.issue(|responder| Command::Scan {
            capacity,
            responder,
        })
    }

    /// Snapshot of the connection state, taken in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] or [`Error::ReplySlotsExhausted`] when the request cannot
    /// be queued.
    pub fn status(self) -> Result<Pending<Result<WifiStatus>>> {
        self.issue(Command::Status)
    }

    /// Wait for the next [`WifiClientEvent`].
    ///
    /// Only the latest event is kept, so a slow reader sees the most recent one.
    pub async fn wait_event(self) -> WifiClientEvent {
        self.resources.events.wait().await
    }

    fn issue<T: Outcome>(
        self,
        command: impl FnOnce(Responder<T>) -> Command,
    ) -> Result<Pending<T>> {
        let (pending, responder) = self.resources.replies.pair()?;
        self.resources
            .commands
            .try_send(command(responder))
            .map_err(|_| {
                #[cfg(feature = "defmt")]
                defmt::error!("WiFi client queue full, request rejected");
                Error::QueueFull
            })?;
        Ok(pending)
    }
}
