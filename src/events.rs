//! Work queue between the scheduler and the main loop.
//!
//! Events are produced by:
//! - Scheduler fires (photo, report, update check, storage clean-up)
//! - Boot (overdue work found while priming the schedules)
//!
//! Events are consumed by the main loop, which runs one workflow per event.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Scheduler   │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Boot        │────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 16;

/// Work items, in the order they are declared to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// Capture and upload a photo.
    PhotoDue = 0,
    /// Build and upload the daily report.
    ReportDue = 1,
    /// Ask the update server for a new firmware version.
    OtaCheckDue = 2,
    /// Empty the modem's staging directory.
    StorageClearDue = 3,
}

impl Event {
    pub const ALL: [Self; 4] = [
        Self::PhotoDue,
        Self::ReportDue,
        Self::OtaCheckDue,
        Self::StorageClearDue,
    ];

    /// Schedule label for this event.
    pub fn label(self) -> &'static str {
        match self {
            Self::PhotoDue => "photo",
            Self::ReportDue => "daily-report",
            Self::OtaCheckDue => "ota-check",
            Self::StorageClearDue => "storage-clear",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.label() == label)
    }

    fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|e| *e as u8 == raw)
    }
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// One producer (scheduler delegate), one consumer (main loop).
// Head is only written by the producer, tail only by the consumer.

pub struct EventQueue {
    head: AtomicU8,
    tail: AtomicU8,
    buffer: [AtomicU8; EVENT_QUEUE_CAP],
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            buffer: [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP],
        }
    }

    /// Push an event.  Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

        if next_head == tail {
            return false; // Queue full, drop event.
        }

        self.buffer[head as usize].store(event as u8, Ordering::Relaxed);
        self.head.store(next_head, Ordering::Release);
        true
    }

    /// Pop the next event, FIFO.  Returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<Event> {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);

            if tail == head {
                return None;
            }

            let raw = self.buffer[tail as usize].load(Ordering::Relaxed);
            self.tail
                .store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

            if let Some(event) = Event::from_u8(raw) {
                return Some(event);
            }
        }
    }

    /// Whether `event` is already waiting.  Used to avoid queueing the same
    /// workflow twice while a long one runs.
    pub fn contains(&self, event: Event) -> bool {
        let head = self.head.load(Ordering::Acquire) as usize;
        let mut i = self.tail.load(Ordering::Relaxed) as usize;
        while i != head {
            if self.buffer[i].load(Ordering::Relaxed) == event as u8 {
                return true;
            }
            i = (i + 1) % EVENT_QUEUE_CAP;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Acquire)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed) as usize;
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Process-wide queue ────────────────────────────────────────

static EVENTS: EventQueue = EventQueue::new();

/// Push into the process-wide queue, skipping duplicates.
/// Returns `false` if the event was dropped.
pub fn push_event(event: Event) -> bool {
    EVENTS.contains(event) || EVENTS.push(event)
}

pub fn pop_event() -> Option<Event> {
    EVENTS.pop()
}

/// Drain all pending events into a callback, FIFO.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}
