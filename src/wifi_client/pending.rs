//! One-shot reply handles shared between callers and the client worker.
//!
//! A caller gets a [`Pending`] and the worker keeps the matching [`Responder`]. Both point at
//! a [`ReplySlot`] from a fixed static pool. The slot returns to the pool once the reply is
//! taken, or once both sides are gone.

use core::cell::RefCell;
use core::future::poll_fn;
use core::marker::PhantomData;
use core::mem;
use core::task::Poll;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_sync::waitqueue::AtomicWaker;

use super::ScanResults;
use super::state::WifiStatus;
use crate::{Error, Result};

/// Number of requests that may be outstanding at once across all callers.
pub const REPLY_SLOT_COUNT: usize = 8;

/// Type-erased reply stored in a slot.
#[doc(hidden)]
#[derive(Debug)]
pub enum Reply {
    Unit,
    Status(Result<()>),
    Scan(Result<ScanResults>),
    Info(Result<WifiStatus>),
}

/// A value that can travel through a reply slot.
pub trait Outcome: Sized {
    #[doc(hidden)]
    fn into_reply(self) -> Reply;
    #[doc(hidden)]
    fn from_reply(reply: Reply) -> Option<Self>;
    /// The value a handle receives when the worker drops it unanswered.
    fn cancelled() -> Self;
}

impl Outcome for () {
    fn into_reply(self) -> Reply {
        Reply::Unit
    }

    fn from_reply(reply: Reply) -> Option<Self> {
        matches!(reply, Reply::Unit).then_some(())
    }

    fn cancelled() -> Self {}
}

impl Outcome for Result<()> {
    fn into_reply(self) -> Reply {
        Reply::Status(self)
    }

    fn from_reply(reply: Reply) -> Option<Self> {
        match reply {
            Reply::Status(result) => Some(result),
            _ => None,
        }
    }

    fn cancelled() -> Self {
        Err(Error::Cancelled)
    }
}

impl Outcome for Result<ScanResults> {
    fn into_reply(self) -> Reply {
        Reply::Scan(self)
    }

    fn from_reply(reply: Reply) -> Option<Self> {
        match reply {
            Reply::Scan(result) => Some(result),
            _ => None,
        }
    }

    fn cancelled() -> Self {
        Err(Error::Cancelled)
    }
}

impl Outcome for Result<WifiStatus> {
    fn into_reply(self) -> Reply {
        Reply::Info(self)
    }

    fn from_reply(reply: Reply) -> Option<Self> {
        match reply {
            Reply::Info(result) => Some(result),
            _ => None,
        }
    }

    fn cancelled() -> Self {
        Err(Error::Cancelled)
    }
}

#[derive(Debug)]
enum SlotState {
    Free,
    Waiting,
    Resolved(Reply),
    /// The caller dropped its handle before the worker answered.
    Abandoned,
}

/// Storage for one outstanding reply.
pub struct ReplySlot {
    state: Mutex<CriticalSectionRawMutex, RefCell<SlotState>>,
    waker: AtomicWaker,
}

impl ReplySlot {
    const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SlotState::Free)),
            waker: AtomicWaker::new(),
        }
    }

    fn claim(&self) -> bool {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if matches!(*state, SlotState::Free) {
                *state = SlotState::Waiting;
                true
            } else {
                false
            }
        })
    }

    fn resolve(&self, reply: Reply) {
        let delivered = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            match mem::replace(&mut *state, SlotState::Free) {
                SlotState::Waiting => {
                    *state = SlotState::Resolved(reply);
                    true
                }
                // Nobody is listening; the slot is already back to Free.
                SlotState::Abandoned => false,
                other => {
                    *state = other;
                    false
                }
            }
        });
        if delivered {
            self.waker.wake();
        }
    }

    fn abandon(&self) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            match mem::replace(&mut *state, SlotState::Free) {
                SlotState::Waiting | SlotState::Abandoned => *state = SlotState::Abandoned,
                SlotState::Resolved(_) | SlotState::Free => {}
            }
        });
    }

    fn take(&self) -> Option<Reply> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            match mem::replace(&mut *state, SlotState::Free) {
                SlotState::Resolved(reply) => Some(reply),
                other => {
                    *state = other;
                    None
                }
            }
        })
    }

    fn is_resolved(&self) -> bool {
        self.state
            .lock(|state| matches!(*state.borrow(), SlotState::Resolved(_)))
    }
}

/// The fixed pool of reply slots.
pub struct ReplySlots([ReplySlot; REPLY_SLOT_COUNT]);

impl ReplySlots {
    pub(crate) const fn new() -> Self {
        Self([const { ReplySlot::new() }; REPLY_SLOT_COUNT])
    }

    /// Claim a free slot and split it into its two ends.
    pub(crate) fn pair<T: Outcome>(&'static self) -> Result<(Pending<T>, Responder<T>)> {
        let slot = self
            .0
            .iter()
            .find(|slot| slot.claim())
            .ok_or(Error::ReplySlotsExhausted)?;
        Ok((
            Pending {
                state: PendingState::Slot(slot),
            },
            Responder {
                slot: Some(slot),
                _outcome: PhantomData,
            },
        ))
    }

    /// Slots not currently claimed by any request.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.0
            .iter()
            .filter(|slot| slot.state.lock(|state| matches!(*state.borrow(), SlotState::Free)))
            .count()
    }
}

enum PendingState<T> {
    Ready(T),
    Slot(&'static ReplySlot),
    Taken,
}

/// Handle to the eventual outcome of a client request.
///
/// Await it with [`wait`](Self::wait), poll it with [`try_take`](Self::try_take), or drop it.
/// Dropping never blocks the worker: the reply is discarded when it arrives.
#[must_use = "dropping a Pending discards the outcome of the request"]
pub struct Pending<T: Outcome> {
    state: PendingState<T>,
}

impl<T: Outcome> Pending<T> {
    /// A handle that is already resolved and holds no slot.
    pub(crate) fn ready(value: T) -> Self {
        Self {
            state: PendingState::Ready(value),
        }
    }

    /// Wait for the worker to resolve the request.
    pub async fn wait(mut self) -> T {
        if let PendingState::Slot(slot) = self.state {
            let reply = poll_fn(|cx| {
                slot.waker.register(cx.waker());
                slot.take().map_or(Poll::Pending, Poll::Ready)
            })
            .await;
            self.state = PendingState::Ready(T::from_reply(reply).unwrap_or_else(T::cancelled));
        }
        match mem::replace(&mut self.state, PendingState::Taken) {
            PendingState::Ready(value) => value,
            PendingState::Slot(_) | PendingState::Taken => T::cancelled(),
        }
    }

    /// Take the outcome if it has arrived, otherwise hand the handle back.
    ///
    /// # Errors
    ///
    /// Returns the unchanged handle when the worker has not resolved it yet.
    pub fn try_take(mut self) -> core::result::Result<T, Self> {
        if let PendingState::Slot(slot) = self.state {
            let Some(reply) = slot.take() else {
                return Err(self);
            };
            self.state = PendingState::Ready(T::from_reply(reply).unwrap_or_else(T::cancelled));
        }
        match mem::replace(&mut self.state, PendingState::Taken) {
            PendingState::Ready(value) => Ok(value),
            PendingState::Slot(_) | PendingState::Taken => Ok(T::cancelled()),
        }
    }

    /// `true` once the outcome is available.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match &self.state {
            PendingState::Slot(slot) => slot.is_resolved(),
            PendingState::Ready(_) | PendingState::Taken => true,
        }
    }
}

impl<T: Outcome> Drop for Pending<T> {
    fn drop(&mut self) {
        if let PendingState::Slot(slot) = self.state {
            slot.abandon();
        }
    }
}

/// Worker end of a request. Resolving consumes it; dropping it resolves with
/// [`Outcome::cancelled`].
pub struct Responder<T: Outcome> {
    slot: Option<&'static ReplySlot>,
    _outcome: PhantomData<fn(T)>,
}

impl<T: Outcome> Responder<T> {
    pub(crate) fn resolve(mut self, value: T) {
        if let Some(slot) = self.slot.take() {
            slot.resolve(value.into_reply());
        }
    }
}

impl<T: Outcome> Drop for Responder<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.resolve(T::cancelled().into_reply());
        }
    }
}
