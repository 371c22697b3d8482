//! joyroster: a live, hot-pluggable roster of game input devices.
//!
//! Tracks the joysticks, gamepads, wheels and flight controllers attached to
//! the machine and decodes their buffered hardware events into typed,
//! deduplicated state changes, without the host polling raw hardware.
//!
//! The crate is poll-driven and single-threaded: the host constructs a
//! [`DeviceManager`] over a platform [`Backend`] and an
//! [`EnumerationTrigger`], then calls [`DeviceManager::tick`] once per
//! frame. Each tick conditionally rescans the roster (connect/disconnect
//! reconciliation) and pumps every live [`Device`]'s event queue; state
//! changes reach the host through synchronous [`ManagerListener`] and
//! [`DeviceListener`] callbacks.
//!
//! ```no_run
//! use std::rc::Rc;
//! use std::time::Duration;
//! use joyroster::{DeviceManager, IntervalEnumerationTrigger};
//! use joyroster::backends::simulated::SimulatedBackend;
//!
//! let backend = Rc::new(SimulatedBackend::new());
//! let trigger = Box::new(IntervalEnumerationTrigger::new(Duration::from_secs(3)));
//! let mut manager = DeviceManager::new(backend, trigger);
//! loop {
//!     manager.tick();
//!     std::thread::sleep(Duration::from_millis(16));
//! }
//! ```

pub mod backend;
pub mod backends;
pub mod descriptor;
pub mod device;
pub mod manager;
pub mod metadata;
pub mod object;
pub mod strings;
pub mod trigger;

pub use backend::{Backend, BackendError, DeviceClass, DeviceHandle, EventKey, PullStatus, RawEvent};
pub use descriptor::{DeviceDescriptor, DeviceId, DeviceKind, ObjectDescriptor, ObjectTag, ProductId};
pub use device::{Device, DeviceListener, EVENT_QUEUE_DEPTH};
pub use manager::{DeviceManager, FamilyProbe, ManagerListener};
pub use metadata::DeviceMeta;
pub use object::{Axis, Button, InputObject, Pov};
pub use trigger::{
    ChangeHookHub, ChangeSignal, DeviceChangeHook, EnumerationTrigger, HookEnumerationTrigger,
    IntervalEnumerationTrigger,
};

use thiserror::Error;

/// Errors surfaced by roster operations.
///
/// These cover construction-time failures only; per-tick polling never
/// errors (transient hardware loss is recovered or retained silently).
#[derive(Debug, Error)]
pub enum Error {
    /// The platform boundary failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A device-change hook could not be installed.
    #[error("device change hook: {0}")]
    Hook(String),
}

/// Convenient result alias for roster operations.
pub type Result<T> = std::result::Result<T, Error>;
