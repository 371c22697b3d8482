//! Simulated input backend.
//!
//! [`SimulatedBackend`] implements [`Backend`](crate::backend::Backend) over
//! a scriptable in-memory roster instead of real hardware. Hosts (and this
//! crate's own tests) attach synthetic devices, queue raw events and inject
//! the failure modes a physical stack produces:
//! - unplug/replug under the same identity ([`detach`](SimulatedBackend::detach)
//!   / re-[`attach`](SimulatedBackend::attach))
//! - lost acquisition and refused reacquire
//! - event-queue overflow (naturally, by exceeding the configured depth, or
//!   injected via [`fail_next_pull`](SimulatedBackend::fail_next_pull))
//! - handle-creation failure
//!
//! [`SimulatedChangeHook`] is the matching
//! [`DeviceChangeHook`](crate::trigger::DeviceChangeHook): it records
//! install/uninstall and lets a script raise the change signal by hand.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::backend::{
    Backend, BackendError, DeviceClass, DeviceHandle, EventKey, PullStatus, RawEvent,
};
use crate::descriptor::{
    DeviceDescriptor, DeviceId, DeviceKind, ObjectDescriptor, ObjectTag, ProductId,
};
use crate::strings::encode_utf16;
use crate::trigger::{ChangeSignal, DeviceChangeHook};
use crate::Error;

/// Builder for one synthetic device.
///
/// Channels are declared in the order the handle will enumerate them;
/// per-type indices and report offsets are assigned automatically.
pub struct SimDevice {
    instance_id: DeviceId,
    product_id: ProductId,
    instance_name: String,
    product_name: String,
    kind: DeviceKind,
    subkind: u16,
    objects: Vec<SimObjectSpec>,
    axes: u16,
    buttons: u16,
    povs: u16,
    next_offset: u32,
}

struct SimObjectSpec {
    descriptor: ObjectDescriptor,
    range: Option<(i32, i32)>,
}

impl SimDevice {
    pub fn new(instance_id: u128, product_id: u32, instance_name: &str, product_name: &str) -> Self {
        Self {
            instance_id: DeviceId::new(instance_id),
            product_id: ProductId::new(product_id),
            instance_name: instance_name.to_string(),
            product_name: product_name.to_string(),
            kind: DeviceKind::Joystick,
            subkind: 0,
            objects: Vec::new(),
            axes: 0,
            buttons: 0,
            povs: 0,
            next_offset: 0,
        }
    }

    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn subkind(mut self, subkind: u16) -> Self {
        self.subkind = subkind;
        self
    }

    /// Declare an axis channel. Degenerate ranges are allowed here on
    /// purpose, to exercise the consumer's defenses.
    pub fn axis(mut self, name: &str, min: i32, max: i32) -> Self {
        let tag = ObjectTag::axis(self.axes);
        self.axes += 1;
        self.push_object(tag, name, Some((min, max)))
    }

    pub fn button(mut self, name: &str) -> Self {
        let tag = ObjectTag::button(self.buttons);
        self.buttons += 1;
        self.push_object(tag, name, None)
    }

    pub fn pov(mut self, name: &str) -> Self {
        let tag = ObjectTag::pov(self.povs);
        self.povs += 1;
        self.push_object(tag, name, None)
    }

    fn push_object(mut self, tag: ObjectTag, name: &str, range: Option<(i32, i32)>) -> Self {
        let offset = self.next_offset;
        self.next_offset += 4;
        self.objects.push(SimObjectSpec {
            descriptor: ObjectDescriptor::new(tag, offset, encode_utf16(name)),
            range,
        });
        self
    }
}

struct SimObject {
    descriptor: ObjectDescriptor,
    range: Option<(i32, i32)>,
    key: EventKey,
}

struct SimRecord {
    descriptor: DeviceDescriptor,
    objects: Vec<SimObject>,
    attached: bool,
    acquired: bool,
    queue: VecDeque<RawEvent>,
    queue_depth: usize,
    overflowed: bool,
    fail_next_pull: Option<PullStatus>,
    fail_next_reacquire: bool,
    fail_next_open: bool,
}

impl SimRecord {
    fn drain(&mut self, capacity: usize) -> Vec<RawEvent> {
        let count = capacity.min(self.queue.len());
        self.queue.drain(..count).collect()
    }
}

/// Scriptable roster of synthetic devices.
///
/// Shared with managers behind `Rc<SimulatedBackend>`; the scripting methods
/// all take `&self` so the host can keep its own clone for driving.
#[derive(Default)]
pub struct SimulatedBackend {
    records: RefCell<Vec<Rc<RefCell<SimRecord>>>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug a device in. Re-attaching an instance id that was seen before
    /// reconnects the *same* record: identity, assigned keys and pending
    /// state all survive, as they would for a physical replug.
    pub fn attach(&self, device: SimDevice) -> DeviceId {
        let id = device.instance_id;
        if let Some(record) = self.record_of(&id) {
            record.borrow_mut().attached = true;
            return id;
        }

        let descriptor = DeviceDescriptor::new(
            device.instance_id,
            device.product_id,
            encode_utf16(&device.instance_name),
            encode_utf16(&device.product_name),
            device.kind,
            device.subkind,
        );
        let objects = device
            .objects
            .into_iter()
            .map(|spec| SimObject {
                descriptor: spec.descriptor,
                range: spec.range,
                key: EventKey::NONE,
            })
            .collect();
        self.records.borrow_mut().push(Rc::new(RefCell::new(SimRecord {
            descriptor,
            objects,
            attached: true,
            acquired: false,
            queue: VecDeque::new(),
            queue_depth: usize::MAX,
            overflowed: false,
            fail_next_pull: None,
            fail_next_reacquire: false,
            fail_next_open: false,
        })));
        id
    }

    /// Pull the device out. Open handles lose acquisition and refuse to
    /// reacquire until the device is attached again.
    pub fn detach(&self, id: &DeviceId) -> bool {
        match self.record_of(id) {
            Some(record) => {
                let mut record = record.borrow_mut();
                record.attached = false;
                record.acquired = false;
                true
            }
            None => false,
        }
    }

    /// Descriptor of a known device (attached or not).
    pub fn descriptor_of(&self, id: &DeviceId) -> Option<DeviceDescriptor> {
        self.record_of(id).map(|record| record.borrow().descriptor.clone())
    }

    /// Queue one event for the channel at `slot` (declaration order).
    ///
    /// The event carries whatever key the consumer registered for that
    /// channel — [`EventKey::NONE`] if the device was never opened.
    pub fn push_event(&self, id: &DeviceId, slot: usize, value: u32) -> bool {
        let Some(record) = self.record_of(id) else {
            return false;
        };
        let mut record = record.borrow_mut();
        let Some((key, offset)) = record
            .objects
            .get(slot)
            .map(|object| (object.key, object.descriptor.offset()))
        else {
            return false;
        };
        Self::enqueue(&mut record, RawEvent { key, offset, value });
        true
    }

    /// Queue an event that belongs to no user object.
    pub fn push_orphan_event(&self, id: &DeviceId, value: u32) -> bool {
        let Some(record) = self.record_of(id) else {
            return false;
        };
        let mut record = record.borrow_mut();
        Self::enqueue(
            &mut record,
            RawEvent {
                key: EventKey::NONE,
                offset: 0,
                value,
            },
        );
        true
    }

    /// Force the next pull on this device to report `status`.
    pub fn fail_next_pull(&self, id: &DeviceId, status: PullStatus) -> bool {
        match self.record_of(id) {
            Some(record) => {
                record.borrow_mut().fail_next_pull = Some(status);
                true
            }
            None => false,
        }
    }

    /// Force the next reacquire attempt on this device to fail.
    pub fn fail_next_reacquire(&self, id: &DeviceId) -> bool {
        match self.record_of(id) {
            Some(record) => {
                record.borrow_mut().fail_next_reacquire = true;
                true
            }
            None => false,
        }
    }

    /// Force the next open of this device to fail.
    pub fn fail_next_open(&self, id: &DeviceId) -> bool {
        match self.record_of(id) {
            Some(record) => {
                record.borrow_mut().fail_next_open = true;
                true
            }
            None => false,
        }
    }

    fn record_of(&self, id: &DeviceId) -> Option<Rc<RefCell<SimRecord>>> {
        self.records
            .borrow()
            .iter()
            .find(|record| record.borrow().descriptor.instance_id() == *id)
            .cloned()
    }

    fn enqueue(record: &mut SimRecord, event: RawEvent) {
        // A full queue loses the newest transitions, like real hardware
        // buffers; the loss is reported once on the next pull.
        if record.queue.len() >= record.queue_depth {
            record.overflowed = true;
            return;
        }
        record.queue.push_back(event);
    }
}

impl Backend for SimulatedBackend {
    fn list_attached(&self, _class: DeviceClass) -> Result<Vec<DeviceDescriptor>, BackendError> {
        // Real platforms are sloppy about the class filter (mice and
        // keyboards get reported regardless), so the simulation does not
        // filter either; admission is the manager's job.
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|record| record.borrow().attached)
            .map(|record| record.borrow().descriptor.clone())
            .collect())
    }

    fn open_device(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Box<dyn DeviceHandle>, BackendError> {
        let Some(record) = self.record_of(&descriptor.instance_id()) else {
            return Err(BackendError::UnknownDevice);
        };
        {
            let mut state = record.borrow_mut();
            if state.descriptor != *descriptor {
                return Err(BackendError::UnknownDevice);
            }
            if state.fail_next_open {
                state.fail_next_open = false;
                return Err(BackendError::Open("injected open failure".to_string()));
            }
            if !state.attached {
                return Err(BackendError::NotAttached);
            }
            state.acquired = true;
        }
        Ok(Box::new(SimulatedHandle { record }))
    }
}

struct SimulatedHandle {
    record: Rc<RefCell<SimRecord>>,
}

impl DeviceHandle for SimulatedHandle {
    fn set_queue_depth(&mut self, depth: usize) -> Result<(), BackendError> {
        self.record.borrow_mut().queue_depth = depth;
        Ok(())
    }

    fn enumerate_objects(&mut self) -> Result<Vec<ObjectDescriptor>, BackendError> {
        Ok(self
            .record
            .borrow()
            .objects
            .iter()
            .map(|object| object.descriptor.clone())
            .collect())
    }

    fn axis_range(&self, tag: ObjectTag) -> Result<(i32, i32), BackendError> {
        let record = self.record.borrow();
        let object = record
            .objects
            .iter()
            .find(|object| object.descriptor.tag() == tag)
            .ok_or(BackendError::Unsupported("unknown channel tag"))?;
        object
            .range
            .ok_or(BackendError::Unsupported("channel has no range"))
    }

    fn set_event_key(&mut self, tag: ObjectTag, key: EventKey) -> Result<(), BackendError> {
        let mut record = self.record.borrow_mut();
        let object = record
            .objects
            .iter_mut()
            .find(|object| object.descriptor.tag() == tag)
            .ok_or(BackendError::Unsupported("unknown channel tag"))?;
        object.key = key;
        Ok(())
    }

    fn pull_events(&mut self, capacity: usize) -> (Vec<RawEvent>, PullStatus) {
        let mut record = self.record.borrow_mut();
        if let Some(status) = record.fail_next_pull.take() {
            match status {
                PullStatus::NeedsReacquire => {
                    record.acquired = false;
                    return (Vec::new(), PullStatus::NeedsReacquire);
                }
                PullStatus::Overflow => {
                    let events = record.drain(capacity);
                    return (events, PullStatus::Overflow);
                }
                PullStatus::Error => {
                    let events = record.drain(capacity);
                    return (events, PullStatus::Error);
                }
                PullStatus::Ok => {}
            }
        }
        if !record.attached || !record.acquired {
            return (Vec::new(), PullStatus::NeedsReacquire);
        }
        let events = record.drain(capacity);
        let status = if record.overflowed {
            record.overflowed = false;
            PullStatus::Overflow
        } else {
            PullStatus::Ok
        };
        (events, status)
    }

    fn reacquire(&mut self) -> bool {
        let mut record = self.record.borrow_mut();
        if record.fail_next_reacquire {
            record.fail_next_reacquire = false;
            return false;
        }
        if !record.attached {
            return false;
        }
        record.acquired = true;
        true
    }
}

/// Scriptable device-change hook for driving [`HookEnumerationTrigger`]
/// (see [`ChangeHookHub`](crate::trigger::ChangeHookHub)) in tests.
///
/// Clones share state, so keep one clone for the hub and one for raising.
#[derive(Clone, Default)]
pub struct SimulatedChangeHook {
    state: Rc<RefCell<HookProbeState>>,
}

#[derive(Default)]
struct HookProbeState {
    signal: Option<ChangeSignal>,
    installs: usize,
    uninstalls: usize,
}

impl SimulatedChangeHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.state.borrow().signal.is_some()
    }

    pub fn installs(&self) -> usize {
        self.state.borrow().installs
    }

    pub fn uninstalls(&self) -> usize {
        self.state.borrow().uninstalls
    }

    /// Raise the change signal, as the platform would on a topology change.
    /// Returns `false` if no trigger has the hook installed.
    pub fn raise(&self) -> bool {
        match &self.state.borrow().signal {
            Some(signal) => {
                signal.raise();
                true
            }
            None => false,
        }
    }
}

impl DeviceChangeHook for SimulatedChangeHook {
    fn install(&mut self, signal: ChangeSignal) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        state.signal = Some(signal);
        state.installs += 1;
        Ok(())
    }

    fn uninstall(&mut self) {
        let mut state = self.state.borrow_mut();
        state.signal = None;
        state.uninstalls += 1;
    }
}
