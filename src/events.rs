//! Bounded event bus.
//!
//! Events are produced by:
//! - The cycle controller (alarms, breath start, calibration requests)
//! - The UI front panel (key presses / releases)
//! - Listeners themselves (follow-up display events)
//!
//! Events are consumed once per control loop iteration by the registered
//! listeners, in registration order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Controller  │────▶│              │     │ Listener 0   │
//! │ UI keys     │────▶│  EventQueue  │────▶│ Listener 1   │
//! │ Listeners   │────▶│  (6 slots)   │     │ ...  (max 4) │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! `post` never blocks and never grows the queue: a full queue drops the
//! new event.  A drain only delivers the events that were queued when it
//! started, so anything a listener posts lands on the next drain.

use heapless::{Deque, String, Vec};
use log::{error, warn};

use crate::alarms::AlarmIndex;
use crate::error::EventError;

/// Maximum number of pending events.
pub const QUEUE_CAPACITY: usize = 6;

/// Maximum number of registered listeners.
pub const LISTENER_CAPACITY: usize = 4;

/// Maximum length of the text payload of [`Event::AlarmDisplayOn`].
pub const TEXT_CAPACITY: usize = 20;

/// Front-panel keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Key {
    Decrement = 0,
    Increment = 1,
    Set = 2,
}

/// Bus event.  The payload kind is fixed per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ── User input ────────────────────────────────────────
    KeyPress(Key),
    KeyRelease(Key),

    // ── Alarms ────────────────────────────────────────────
    Alarm(AlarmIndex),
    /// Show alarm text on the display.
    AlarmDisplayOn(String<TEXT_CAPACITY>),
    /// Clear the alarm text.
    AlarmDisplayOff,

    // ── Cycle ─────────────────────────────────────────────
    /// A breath started at the given millisecond timestamp.
    CycleStarted(u64),
}

impl Event {
    /// Build an [`Event::AlarmDisplayOn`], truncating `text` to
    /// [`TEXT_CAPACITY`] bytes on a character boundary.
    pub fn display_text(text: &str) -> Self {
        let mut s = String::new();
        for c in text.chars() {
            if s.push(c).is_err() {
                break;
            }
        }
        Self::AlarmDisplayOn(s)
    }
}

/// Listener verdict after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Offer the event to the next listener.
    Continue,
    /// Hide the event from every listener registered after this one.
    Stop,
}

/// A bus subscriber.
///
/// Listeners get the queue so they can post follow-up events; those are
/// delivered on the next drain, never the current one.
pub trait Listener {
    fn on_event(&mut self, event: &Event, queue: &mut EventQueue) -> Propagation;
}

// ── Queue ─────────────────────────────────────────────────────

/// Fixed-capacity FIFO of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Deque<Event, QUEUE_CAPACITY>,
    dropped: u32,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event.  Returns `false` (and counts the drop) when full.
    pub fn post(&mut self, event: Event) -> bool {
        match self.pending.push_back(event) {
            Ok(()) => true,
            Err(event) => {
                self.dropped = self.dropped.saturating_add(1);
                warn!("EVENT queue full, dropped {:?}", event);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Events dropped since startup.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    fn pop(&mut self) -> Option<Event> {
        self.pending.pop_front()
    }
}

// ── Bus ───────────────────────────────────────────────────────

/// Queue plus the listener registry.
pub struct EventBus {
    queue: EventQueue,
    listeners: Vec<Box<dyn Listener>, LISTENER_CAPACITY>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            listeners: Vec::new(),
        }
    }

    /// Add a listener.  Intended for startup; the registry never shrinks.
    pub fn register(&mut self, listener: Box<dyn Listener>) -> Result<(), EventError> {
        if self.listeners.push(listener).is_err() {
            error!(
                "EVENT listener registry full ({} slots), registration rejected",
                LISTENER_CAPACITY
            );
            return Err(EventError::RegistryFull);
        }
        Ok(())
    }

    /// See [`EventQueue::post`].
    pub fn post(&mut self, event: Event) -> bool {
        self.queue.post(event)
    }

    /// Deliver every event that is queued right now, in FIFO order.
    ///
    /// Returns the number of events taken off the queue.
    pub fn drain_and_dispatch(&mut self) -> usize {
        let batch = self.queue.len();
        for _ in 0..batch {
            let Some(event) = self.queue.pop() else {
                break;
            };
            for listener in &mut self.listeners {
                if listener.on_event(&event, &mut self.queue) == Propagation::Stop {
                    break;
                }
            }
        }
        batch
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn dropped(&self) -> u32 {
        self.queue.dropped()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
