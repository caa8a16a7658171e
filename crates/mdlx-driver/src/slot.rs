//! Bounded table of pending response sinks.

use std::sync::{Mutex, PoisonError};

use crossbeam_channel::Sender;

use crate::envelope::ResponseEnvelope;
use crate::error::{MdlxError, Result};

/// Single-shot handoff delivering one completion to one waiting caller.
///
/// Capacity 1, so delivery never blocks the poller. Dropping the sink
/// without sending tells the caller the device is gone.
pub(crate) type ResponseSink = Sender<ResponseEnvelope>;

/// Fixed-capacity map from in-flight slot ids to response sinks.
///
/// The pusher is the only caller of [`put`](Self::put) and the poller the
/// only caller of [`take`](Self::take); the worker's `available` counter
/// keeps the two sides off the same slot, and [`fail_all`](Self::fail_all)
/// runs only once the poller can no longer deliver.
#[derive(Debug)]
pub(crate) struct SlotTable {
    slots: Mutex<Vec<Option<ResponseSink>>>,
}

impl SlotTable {
    pub(crate) fn new(max_pending: usize) -> Self {
        let mut slots = Vec::with_capacity(max_pending);
        slots.resize_with(max_pending, || None);
        Self {
            slots: Mutex::new(slots),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Option<ResponseSink>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Occupy the lowest vacant slot.
    ///
    /// Fails with [`MdlxError::TableFull`] when every slot is pending; the
    /// pusher treats that as transient.
    pub(crate) fn put(&self, sink: ResponseSink) -> Result<u64> {
        let mut slots = self.lock();
        for (slot, entry) in slots.iter_mut().enumerate() {
            if entry.is_none() {
                *entry = Some(sink);
                return Ok(slot as u64);
            }
        }
        Err(MdlxError::TableFull)
    }

    /// Release `slot` and return its sink.
    pub(crate) fn take(&self, slot: u64) -> Result<ResponseSink> {
        let mut slots = self.lock();
        let capacity = slots.len();
        let entry = usize::try_from(slot)
            .ok()
            .and_then(|i| slots.get_mut(i))
            .ok_or(MdlxError::SlotOutOfRange { slot, capacity })?;
        entry.take().ok_or(MdlxError::SlotVacant { slot })
    }

    /// Deliver the device-down sentinel to every occupied slot, in slot
    /// order, and clear the table. Returns the number of failed callers.
    pub(crate) fn fail_all(&self) -> usize {
        let mut slots = self.lock();
        let mut failed = 0;
        for entry in slots.iter_mut() {
            if let Some(sink) = entry.take() {
                let _ = sink.send(ResponseEnvelope::device_down());
                failed += 1;
            }
        }
        failed
    }
}
