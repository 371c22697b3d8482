//! Enumeration triggers: deciding when a full roster rescan is due.
//!
//! The manager asks its trigger once per tick; a trigger answers `true` at
//! most once per underlying occurrence (edge-triggered, draining its own
//! pending flag). Two strategies are provided:
//! - [`HookEnumerationTrigger`] — driven by a platform device-change hook
//!   raising a [`ChangeSignal`], possibly from another thread.
//! - [`IntervalEnumerationTrigger`] — driven by wall-clock intervals.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::Error;

/// Decides whether the device roster should be rescanned this tick.
pub trait EnumerationTrigger {
    /// Edge-triggered: consumes the pending state it reports.
    fn enumeration_needed(&mut self) -> bool;
}

/// Platform collaborator that delivers hardware-change notifications.
///
/// `install` hands over the [`ChangeSignal`] to raise whenever the device
/// topology changes; `uninstall` must stop raising it. Installation is
/// shared: one hook serves every trigger created from the same
/// [`ChangeHookHub`].
pub trait DeviceChangeHook {
    fn install(&mut self, signal: ChangeSignal) -> Result<(), Error>;
    fn uninstall(&mut self);
}

/// Raised by the platform hook when the device topology changed.
///
/// Cheap to clone and safe to raise from any thread: raising only flips the
/// pending flag of every live trigger; consumption stays synchronous inside
/// the caller's tick.
#[derive(Clone)]
pub struct ChangeSignal {
    flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl ChangeSignal {
    pub fn raise(&self) {
        if let Ok(flags) = self.flags.lock() {
            for flag in flags.iter() {
                flag.store(true, Ordering::Release);
            }
        }
    }
}

struct HubState {
    hook: Box<dyn DeviceChangeHook>,
    flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
    installed: bool,
}

/// Shared registration point for hook-based triggers.
///
/// The hub owns the underlying [`DeviceChangeHook`]. The first trigger
/// created installs it; dropping the last live trigger uninstalls it. A new
/// trigger created afterwards installs it again.
#[derive(Clone)]
pub struct ChangeHookHub {
    state: Rc<RefCell<HubState>>,
}

impl ChangeHookHub {
    pub fn new(hook: Box<dyn DeviceChangeHook>) -> Self {
        Self {
            state: Rc::new(RefCell::new(HubState {
                hook,
                flags: Arc::new(Mutex::new(Vec::new())),
                installed: false,
            })),
        }
    }

    /// Create a trigger backed by this hub's hook.
    pub fn trigger(&self) -> Result<HookEnumerationTrigger, Error> {
        let mut state = self.state.borrow_mut();
        if !state.installed {
            let signal = ChangeSignal {
                flags: state.flags.clone(),
            };
            state.hook.install(signal)?;
            state.installed = true;
            log::debug!("device change hook installed");
        }
        // Start pending so the first call scans immediately instead of
        // waiting for a first system-wide change notification.
        let pending = Arc::new(AtomicBool::new(true));
        if let Ok(mut flags) = state.flags.lock() {
            flags.push(pending.clone());
        }
        Ok(HookEnumerationTrigger {
            state: self.state.clone(),
            pending,
        })
    }
}

/// Trigger driven by a platform device-change hook.
pub struct HookEnumerationTrigger {
    state: Rc<RefCell<HubState>>,
    pending: Arc<AtomicBool>,
}

impl EnumerationTrigger for HookEnumerationTrigger {
    fn enumeration_needed(&mut self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

impl Drop for HookEnumerationTrigger {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        let mut last = false;
        if let Ok(mut flags) = state.flags.lock() {
            flags.retain(|flag| !Arc::ptr_eq(flag, &self.pending));
            last = flags.is_empty();
        }
        if last && state.installed {
            state.hook.uninstall();
            state.installed = false;
            log::debug!("device change hook uninstalled");
        }
    }
}

/// Trigger driven by wall-clock intervals.
///
/// An interval of zero means "always due". The schedule is anchored at the
/// construction instant: when a call finds the trigger overdue, the next due
/// time advances to one interval past the last whole interval elapsed since
/// the start, so a stalled caller does not get a burst of catch-up rescans.
pub struct IntervalEnumerationTrigger {
    interval: Duration,
    start: Instant,
    next: Instant,
}

impl IntervalEnumerationTrigger {
    pub fn new(interval: Duration) -> Self {
        let start = Instant::now();
        // First enumeration is due immediately rather than one interval out.
        Self {
            interval,
            start,
            next: start,
        }
    }

    fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.advance(now);
        true
    }

    fn advance(&mut self, now: Instant) {
        if self.interval.is_zero() {
            self.next = now;
            return;
        }
        let intervals_done =
            (now.duration_since(self.start).as_nanos() / self.interval.as_nanos()) as u32;
        self.next = self.start + self.interval * (intervals_done + 1);
    }
}

impl EnumerationTrigger for IntervalEnumerationTrigger {
    fn enumeration_needed(&mut self) -> bool {
        self.due(Instant::now())
    }
}
