//! Platform input API boundary.
//!
//! Everything the core needs from the underlying input stack is captured by
//! two traits:
//! - [`Backend`] — the process-wide platform context: enumeration by device
//!   class and handle creation. The manager holds it behind `Rc`, so several
//!   managers can share one context and the last clone dropped tears it
//!   down.
//! - [`DeviceHandle`] — one opened device: buffered-event queue
//!   configuration and retrieval, object enumeration, acquire/reacquire
//!   semantics. Dropping the handle releases it (unacquire then close);
//!   backends implement that in their `Drop`.
//!
//! Hot-path results are status-coded ([`PullStatus`]), not `Result`-coded:
//! losing a device mid-session is an expected condition, not an error.

use thiserror::Error;

use crate::descriptor::{DeviceDescriptor, ObjectDescriptor, ObjectTag};

/// Errors reported by the platform boundary.
///
/// These surface from construction-time operations only; per-tick polling
/// reports through [`PullStatus`] instead.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The descriptor refers to a device that is no longer attached.
    #[error("device is not attached")]
    NotAttached,

    /// The descriptor is unknown to this backend.
    #[error("unknown device")]
    UnknownDevice,

    /// Handle creation failed.
    #[error("failed to open device: {0}")]
    Open(String),

    /// The handle cannot perform the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Any other platform-level failure.
    #[error("platform error: {0}")]
    Platform(String),
}

/// Device category filter for enumeration.
///
/// Note that platform stacks are not always strict about this: some are
/// known to report mice and keyboards as attached even when they are not
/// asked for, which is why the manager re-checks
/// [`DeviceKind`](crate::descriptor::DeviceKind) after enumerating.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeviceClass {
    /// Joysticks, gamepads, wheels, flight and first-person controllers.
    GameControllers,
    /// Every device the platform knows about.
    All,
}

/// Back-reference tag carried by each raw event.
///
/// At construction time the device assigns every input object a dense key
/// (its slot in the object list) and registers it on the handle via
/// [`DeviceHandle::set_event_key`]; the hardware layer then stamps that key
/// on each event so dispatch is a single table lookup. [`EventKey::NONE`]
/// marks events that belong to no user object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EventKey(u32);

impl EventKey {
    /// Sentinel: the event carries no user object.
    pub const NONE: EventKey = EventKey(u32::MAX);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Slot in the owning device's object table, or `None` for the sentinel.
    pub fn slot(self) -> Option<usize> {
        if self == Self::NONE {
            None
        } else {
            Some(self.0 as usize)
        }
    }
}

/// One buffered hardware event as delivered by the platform.
#[derive(Clone, Copy, Debug)]
pub struct RawEvent {
    /// Back-reference to the input object this event belongs to.
    pub key: EventKey,
    /// Report offset of the originating channel. Diagnostic only.
    pub offset: u32,
    /// Raw payload; meaning depends on the channel type.
    pub value: u32,
}

/// Outcome of one buffered-queue pull.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PullStatus {
    /// The batch is complete.
    Ok,
    /// The handle lost acquisition (device unplugged or backgrounded);
    /// no data was delivered. A [`DeviceHandle::reacquire`] may revive it.
    NeedsReacquire,
    /// The queue overflowed; the delivered batch is missing transitions
    /// that are unrecoverably lost.
    Overflow,
    /// An unclassified failure; whatever was delivered is best-effort.
    Error,
}

/// Process-wide platform context.
pub trait Backend {
    /// Snapshot the currently attached devices matching `class`.
    fn list_attached(&self, class: DeviceClass) -> Result<Vec<DeviceDescriptor>, BackendError>;

    /// Open an exclusive handle for the device `descriptor` refers to.
    fn open_device(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Box<dyn DeviceHandle>, BackendError>;
}

/// One opened hardware device.
///
/// Implementations release the handle on `Drop` (unacquire, then close).
/// The owning [`Device`](crate::device::Device) guarantees its input objects
/// are torn down first.
pub trait DeviceHandle {
    /// Configure the depth of the buffered event queue.
    fn set_queue_depth(&mut self, depth: usize) -> Result<(), BackendError>;

    /// Enumerate the reporting channels of this device.
    fn enumerate_objects(&mut self) -> Result<Vec<ObjectDescriptor>, BackendError>;

    /// Reported value range of an axis channel.
    fn axis_range(&self, tag: ObjectTag) -> Result<(i32, i32), BackendError>;

    /// Register the back-reference key the hardware layer should stamp on
    /// events from the channel `tag` identifies.
    fn set_event_key(&mut self, tag: ObjectTag, key: EventKey) -> Result<(), BackendError>;

    /// Pull up to `capacity` queued events. Non-blocking.
    fn pull_events(&mut self, capacity: usize) -> (Vec<RawEvent>, PullStatus);

    /// Try to re-establish communication after [`PullStatus::NeedsReacquire`].
    /// Returns whether the handle is acquired afterwards.
    fn reacquire(&mut self) -> bool;
}
