use derive_more::derive::{Display, Error};

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failure reported by a [`WifiDriver`](crate::WifiDriver) call.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    #[display("driver returned status {_0}")]
    Status(#[error(not(source))] u32),

    #[display("driver is not initialized")]
    NotInitialized,

    #[cfg(feature = "wifi")]
    #[display("driver task could not be spawned: {_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),
}

/// Define a unified error type for this crate.
///
/// Every outcome carried by a [`Pending`](crate::Pending) handle uses this type, as does
/// the `Result` returned when a request cannot even be queued.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[cfg(feature = "wifi")]
    #[display("{_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),

    #[display("SSID is {len} bytes, the driver accepts at most {max}")]
    SsidTooLong { len: usize, max: usize },

    #[display("password is {len} bytes, the driver accepts at most {max}")]
    PasswordTooLong { len: usize, max: usize },

    #[display("WiFi client is already started")]
    AlreadyStarted,

    #[display("WiFi client is not started")]
    NotStarted,

    #[display("WiFi bring-up failed: {_0}")]
    Initialization(DriverError),

    #[display("could not read station configuration: {_0}")]
    ConfigRead(DriverError),

    #[display("could not write station configuration: {_0}")]
    ConfigWrite(DriverError),

    #[display("could not start connection: {_0}")]
    ConnectIssue(DriverError),

    #[display("could not start scan: {_0}")]
    ScanIssue(DriverError),

    #[display("could not read scan records: {_0}")]
    ScanRecords(DriverError),

    #[display("scan capacity {requested} exceeds the {available} record scratch buffer")]
    ScanAllocation { requested: usize, available: usize },

    #[display("superseded by a newer request")]
    Superseded,

    #[display("cancelled before completion")]
    Cancelled,

    #[display("gave up after {attempts} connection attempts")]
    ConnectAttemptsExhausted { attempts: u32 },

    #[display("WiFi client command queue is full")]
    QueueFull,

    #[display("no free reply slot for a new request")]
    ReplySlotsExhausted,
}

#[cfg(feature = "wifi")]
impl From<embassy_executor::SpawnError> for Error {
    fn from(err: embassy_executor::SpawnError) -> Self {
        Self::TaskSpawn(err)
    }
}
