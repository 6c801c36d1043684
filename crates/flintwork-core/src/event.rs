//! Typed outcome events, an ordered delivery queue and per-kind history.
//!
//! The knapping and hafting modules report every outcome of an impact or
//! contact as an [`Event`]. The [`crate::workbench::Workbench`] forwards them
//! into an [`EventBus`], which queues them until the next delivery and then
//! hands them to passive subscribers (UI, haptics, audio, analytics) in the
//! order they were emitted. A per-[`EventKind`] ring buffer keeps recent
//! history for inspection.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use crate::capability::AttachedPart;
use crate::id::*;
use crate::sim::Ticks;
use glam::Vec3;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Payload shared by every knapping outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlakeEventArgs {
    pub objective: ObjectiveId,
    /// Interactor holding the blank when the strike landed, if any.
    pub holder: Option<InteractorId>,
    /// Interactor that delivered the strike.
    pub knapper: InteractorId,
    pub flake: FlakeId,
    pub impact_point: Vec3,
    pub impact_force: f32,
    /// Matched strike angle in degrees; NaN unless the flake detached.
    pub impact_angle: f32,
    pub tick: Ticks,
}

/// A core outcome. All events carry the tick at which they occurred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    // -- Knapping --
    DependenciesRemaining(FlakeEventArgs),
    InvalidAngle(FlakeEventArgs),
    WeakImpact(FlakeEventArgs),
    DetachCooldown(FlakeEventArgs),
    Detached(FlakeEventArgs),

    // -- Hafting --
    Attached {
        attach_point: AttachPointId,
        handle: HandleId,
        part: AttachedPart,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DependenciesRemaining,
    InvalidAngle,
    WeakImpact,
    DetachCooldown,
    Detached,
    Attached,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 6;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DependenciesRemaining(_) => EventKind::DependenciesRemaining,
            Event::InvalidAngle(_) => EventKind::InvalidAngle,
            Event::WeakImpact(_) => EventKind::WeakImpact,
            Event::DetachCooldown(_) => EventKind::DetachCooldown,
            Event::Detached(_) => EventKind::Detached,
            Event::Attached { .. } => EventKind::Attached,
        }
    }

    /// Tick at which the outcome occurred.
    pub fn tick(&self) -> Ticks {
        match self {
            Event::DependenciesRemaining(args)
            | Event::InvalidAngle(args)
            | Event::WeakImpact(args)
            | Event::DetachCooldown(args)
            | Event::Detached(args) => args.tick,
            Event::Attached { tick, .. } => *tick,
        }
    }

    /// The knapping payload, if this is a knapping outcome.
    pub fn flake_args(&self) -> Option<&FlakeEventArgs> {
        match self {
            Event::DependenciesRemaining(args)
            | Event::InvalidAngle(args)
            | Event::WeakImpact(args)
            | Event::DetachCooldown(args)
            | Event::Detached(args) => Some(args),
            Event::Attached { .. } => None,
        }
    }
}

impl EventKind {
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::DependenciesRemaining,
        EventKind::InvalidAngle,
        EventKind::WeakImpact,
        EventKind::DetachCooldown,
        EventKind::Detached,
        EventKind::Attached,
    ];

    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer -- pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
    /// Events overwritten because the buffer was full.
    dropped: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: vec![None; capacity],
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
        }
    }

    /// Push an event into the ring buffer. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        if self.len == self.capacity() {
            self.dropped += 1;
        }
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    /// The total capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    /// Number of events currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no events.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events overwritten because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        // Once full, head points at the oldest entry.
        let start = if self.len < self.capacity() { 0 } else { self.head };
        let capacity = self.capacity();
        (0..self.len).filter_map(move |offset| self.events[(start + offset) % capacity].as_ref())
    }

    /// Empty the buffer. Counters are kept.
    pub fn clear(&mut self) {
        self.events.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Priority level for event subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct SubscriberEntry {
    listener: PassiveListener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Holds the delivery queue, one history ring buffer per event kind,
/// subscriber lists, and suppression flags.
///
/// The queue is unbounded: every emitted event reaches subscribers on the
/// next [`EventBus::deliver`]. Only the per-kind history is capped.
pub struct EventBus {
    /// Events awaiting delivery, in emission order.
    pending: Vec<Event>,
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    default_capacity: usize,
    /// Monotonically increasing counter for stable sort ordering.
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending.len())
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a new event bus with the given default buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: Default::default(),
            default_capacity,
            next_insertion_order: 0,
        }
    }

    /// Suppress an event kind. Suppressed events are never allocated or buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    /// Whether events of this kind are being discarded.
    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Queue an event for delivery and record it in its kind's history.
    /// No-ops if its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let kind = event.kind();
        let idx = kind.index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        let buffer = self.buffers[idx].get_or_insert_with(|| EventBuffer::new(capacity));
        if buffer.len() == buffer.capacity() {
            tracing::warn!(
                ?kind,
                capacity = buffer.capacity(),
                dropped = buffer.dropped_count() + 1,
                "event history full, overwriting oldest entry"
            );
        }
        buffer.push(event);
        self.pending.push(event);
    }

    /// Queue several events, in order.
    pub fn emit_all(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Register a listener with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    /// Register a listener with explicit priority and optional filter.
    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.subscribers[kind.index()].push(SubscriberEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
    }

    /// Deliver every queued event to subscribers in emission order, across
    /// kinds, then clear the queue and the history buffers. For each event,
    /// its kind's subscribers run in `(priority, registration)` order.
    ///
    /// Returns the number of events delivered.
    pub fn deliver(&mut self) -> usize {
        let events = std::mem::take(&mut self.pending);
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
        for subscribers in &mut self.subscribers {
            subscribers.sort_by_key(|entry| (entry.priority, entry.insertion_order));
        }

        let mut delivered = 0;
        for event in &events {
            let idx = event.kind().index();
            // Suppressed after it was queued.
            if self.suppressed[idx] {
                continue;
            }
            delivered += 1;
            for entry in self.subscribers[idx].iter_mut() {
                if entry.filter.as_ref().is_some_and(|filter| !filter(event)) {
                    continue;
                }
                (entry.listener)(event);
            }
        }
        delivered
    }

    /// Number of events waiting for the next delivery.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Recent history for a kind, if any event of that kind was emitted.
    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Events of a kind currently held in history.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    /// Total events ever emitted for a kind, including delivered ones.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map_or(0, EventBuffer::total_written)
    }

    /// Drop queued events and history. Subscribers and suppression stay.
    pub fn clear_all(&mut self) {
        self.pending.clear();
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
