//! One tracked hardware device.
//!
//! A [`Device`] owns its platform handle and the [`InputObject`]s built from
//! the handle's channel enumeration. Per tick it drains the handle's
//! buffered event queue and dispatches each event to the owning object by
//! its back-reference key; objects that actually change state fire the
//! registered [`DeviceListener`]s synchronously, one notification per
//! decoded transition.
//!
//! ## Unplug behavior
//! A device whose handle stops delivering (unplugged, backgrounded) is kept
//! alive with its last-known state: `update()` attempts one reacquire and
//! otherwise returns silently. If the same physical device comes back under
//! the same identity before the manager reconciles it away, the handle
//! resumes and data flows again.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{Backend, DeviceHandle, EventKey, PullStatus, RawEvent};
use crate::descriptor::DeviceDescriptor;
use crate::metadata::DeviceMeta;
use crate::object::{Axis, Button, InputObject, Pov};
use crate::Error;

/// Depth of the buffered event queue configured on every handle.
///
/// Deep enough that a tick at game rates never overflows on real
/// controllers; overflow is survivable either way (the partial batch is
/// accepted and counted).
pub const EVENT_QUEUE_DEPTH: usize = 124;

/// Receives object-change notifications from one device.
///
/// Callbacks run synchronously inside [`Device::update`]; registering or
/// removing listeners from within a callback is safe.
pub trait DeviceListener {
    fn on_object_changed(&mut self, _device: &Device, _object: &InputObject) {}
}

type ListenerHandle = Rc<RefCell<dyn DeviceListener>>;

/// A joystick, gamepad or other game controller currently on the roster.
pub struct Device {
    descriptor: DeviceDescriptor,
    // Objects are declared before the handle: they must be torn down first,
    // since handle release happens in the backend's Drop.
    objects: Vec<InputObject>,
    listeners: RefCell<Vec<ListenerHandle>>,
    overflow_count: u64,
    handle: Box<dyn DeviceHandle>,
}

impl Device {
    /// Open the device `descriptor` refers to and enumerate its channels.
    ///
    /// Channels of unsupported kinds are skipped; an axis whose reported
    /// range is degenerate, or a channel the handle refuses to key, is
    /// dropped with a warning. Handle-level failures surface as errors so
    /// the manager can skip this descriptor and keep reconciling the rest
    /// of the roster.
    pub(crate) fn open(backend: &dyn Backend, descriptor: DeviceDescriptor) -> Result<Self, Error> {
        let mut handle = backend.open_device(&descriptor)?;
        handle.set_queue_depth(EVENT_QUEUE_DEPTH)?;

        let mut objects = Vec::new();
        for object_descriptor in handle.enumerate_objects()? {
            let tag = object_descriptor.tag();
            let object = if tag.is_axis() {
                match handle.axis_range(tag) {
                    Ok((min, max)) if min < max => {
                        InputObject::Axis(Axis::new(object_descriptor, min, max))
                    }
                    Ok((min, max)) => {
                        log::warn!(
                            "skipping axis '{}' with degenerate range {min}..{max}",
                            object_descriptor.name()
                        );
                        continue;
                    }
                    Err(err) => {
                        log::warn!(
                            "skipping axis '{}': range query failed: {err}",
                            object_descriptor.name()
                        );
                        continue;
                    }
                }
            } else if tag.is_button() {
                InputObject::Button(Button::new(object_descriptor))
            } else if tag.is_pov() {
                InputObject::Pov(Pov::new(object_descriptor))
            } else {
                log::debug!("skipping unsupported object '{}'", object_descriptor.name());
                continue;
            };

            // Key the channel so the hardware layer stamps events with the
            // object's slot; a channel that cannot be keyed cannot be
            // dispatched to and is dropped.
            let key = EventKey::new(objects.len() as u32);
            match handle.set_event_key(object.descriptor().tag(), key) {
                Ok(()) => objects.push(object),
                Err(err) => {
                    log::warn!("dropping object '{}': {err}", object.descriptor().name());
                }
            }
        }

        log::debug!(
            "opened '{}' with {} objects",
            descriptor.instance_name(),
            objects.len()
        );

        Ok(Self {
            descriptor,
            objects,
            listeners: RefCell::new(Vec::new()),
            overflow_count: 0,
            handle,
        })
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// The device's channels, in enumeration order.
    pub fn objects(&self) -> &[InputObject] {
        &self.objects
    }

    /// How many pulls came back with an overflowed queue. Transitions lost
    /// to overflow are unrecoverable; this counter is the only trace.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// Summary snapshot for UI/diagnostics.
    pub fn meta(&self) -> DeviceMeta {
        let mut axes = 0;
        let mut buttons = 0;
        let mut povs = 0;
        for object in &self.objects {
            match object {
                InputObject::Axis(_) => axes += 1,
                InputObject::Button(_) => buttons += 1,
                InputObject::Pov(_) => povs += 1,
            }
        }
        DeviceMeta {
            instance_id: self.descriptor.instance_id().to_string(),
            instance_name: self.descriptor.instance_name().to_string(),
            product_name: self.descriptor.product_name().to_string(),
            kind: self.descriptor.kind(),
            subkind: self.descriptor.subkind(),
            axes,
            buttons,
            povs,
        }
    }

    /// Drain the buffered event queue and dispatch every delivered event.
    ///
    /// A handle that lost acquisition gets one reacquire-and-retry; if that
    /// still fails the call returns silently and the device keeps its
    /// last-known state. An overflowed pull is accepted as-is; some
    /// transitions are lost and there is nothing to be done about it.
    pub fn update(&mut self) {
        let (events, status) = self.handle.pull_events(EVENT_QUEUE_DEPTH);
        let events = match status {
            PullStatus::Ok => events,
            PullStatus::Overflow => {
                self.overflow_count += 1;
                log::debug!("'{}': event queue overflowed", self.descriptor.instance_name());
                events
            }
            PullStatus::NeedsReacquire => {
                if !self.handle.reacquire() {
                    // Better luck next update; expected while unplugged.
                    log::trace!("'{}': reacquire failed", self.descriptor.instance_name());
                    return;
                }
                let (events, status) = self.handle.pull_events(EVENT_QUEUE_DEPTH);
                if status != PullStatus::Ok {
                    return;
                }
                events
            }
            // Unclassified platform failure; take whatever was delivered.
            PullStatus::Error => events,
        };

        for event in &events {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: &RawEvent) {
        // The sentinel marks platform objects we never built a user object
        // for; those events are dropped without comment.
        let Some(slot) = event.key.slot() else {
            return;
        };
        let changed = match self.objects.get_mut(slot) {
            Some(object) => object.update_from(event),
            None => {
                log::debug!(
                    "'{}': event for unknown key {}",
                    self.descriptor.instance_name(),
                    event.key.raw()
                );
                return;
            }
        };
        if changed {
            self.notify_object_changed(slot);
        }
    }

    fn notify_object_changed(&self, slot: usize) {
        // Snapshot so listeners may register/unregister during dispatch.
        let snapshot: Vec<ListenerHandle> = self.listeners.borrow().clone();
        let object = &self.objects[slot];
        for listener in snapshot {
            listener.borrow_mut().on_object_changed(self, object);
        }
    }

    pub fn add_listener(&self, listener: ListenerHandle) {
        self.listeners.borrow_mut().push(listener);
    }

    /// Unregister by handle identity. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &ListenerHandle) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|l| Rc::ptr_eq(l, listener)) {
            Some(position) => {
                listeners.remove(position);
                true
            }
            None => false,
        }
    }

    pub fn remove_all_listeners(&self) {
        let snapshot: Vec<ListenerHandle> = self.listeners.borrow().clone();
        for listener in &snapshot {
            self.remove_listener(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::{SimDevice, SimulatedBackend};
    use crate::descriptor::DeviceId;
    use crate::object::InputObject;

    fn stick() -> SimDevice {
        SimDevice::new(1, 0xABCD, "Stick", "Maker Stick")
            .axis("X Axis", 0, 65535)
            .axis("Y Axis", 0, 65535)
            .button("Trigger")
            .pov("Hat Switch")
    }

    fn open_stick(backend: &SimulatedBackend) -> Device {
        let id = backend.attach(stick());
        let descriptor = backend
            .descriptor_of(&id)
            .expect("descriptor for attached device");
        Device::open(backend, descriptor).expect("open")
    }

    #[derive(Default)]
    struct Recorder {
        changes: Vec<String>,
        button_states: Vec<bool>,
    }

    impl DeviceListener for Recorder {
        fn on_object_changed(&mut self, _device: &Device, object: &InputObject) {
            self.changes.push(object.descriptor().name().to_string());
            if let InputObject::Button(button) = object {
                self.button_states.push(button.is_pressed());
            }
        }
    }

    #[test]
    fn open_builds_objects_in_enumeration_order() {
        let backend = SimulatedBackend::new();
        let device = open_stick(&backend);
        let names: Vec<&str> = device.objects().iter().map(|o| o.descriptor().name()).collect();
        assert_eq!(names, ["X Axis", "Y Axis", "Trigger", "Hat Switch"]);
        assert_eq!(device.meta().axes, 2);
        assert_eq!(device.meta().buttons, 1);
        assert_eq!(device.meta().povs, 1);
    }

    #[test]
    fn axes_start_at_range_midpoint() {
        let backend = SimulatedBackend::new();
        let device = open_stick(&backend);
        let axis = device.objects()[0].as_axis().expect("axis");
        assert_eq!(axis.value(), 32767);
    }

    #[test]
    fn degenerate_axis_range_is_skipped() {
        let backend = SimulatedBackend::new();
        let id = backend.attach(
            SimDevice::new(9, 0, "Odd", "Odd Maker")
                .axis("Broken", 5, 5)
                .button("Fire"),
        );
        let descriptor = backend.descriptor_of(&id).unwrap();
        let device = Device::open(&backend, descriptor).unwrap();
        assert_eq!(device.objects().len(), 1);
        assert!(device.objects()[0].as_button().is_some());
    }

    #[test]
    fn update_dispatches_and_notifies_per_transition() {
        let backend = SimulatedBackend::new();
        let mut device = open_stick(&backend);
        let id = device.descriptor().instance_id();

        let recorder = Rc::new(RefCell::new(Recorder::default()));
        device.add_listener(recorder.clone());

        // Trigger is slot 2: press, release, press in a single batch.
        backend.push_event(&id, 2, 0x80);
        backend.push_event(&id, 2, 0x00);
        backend.push_event(&id, 2, 0x80);
        device.update();

        let recorder = recorder.borrow();
        assert_eq!(recorder.changes.len(), 3);
        // Listeners observe each intermediate transition.
        assert_eq!(recorder.button_states, [true, false, true]);
    }

    #[test]
    fn duplicate_state_fires_no_notification() {
        let backend = SimulatedBackend::new();
        let mut device = open_stick(&backend);
        let id = device.descriptor().instance_id();

        let recorder = Rc::new(RefCell::new(Recorder::default()));
        device.add_listener(recorder.clone());

        backend.push_event(&id, 0, 40000);
        backend.push_event(&id, 0, 40000);
        device.update();

        assert_eq!(recorder.borrow().changes.len(), 1);
    }

    #[test]
    fn orphan_events_are_ignored() {
        let backend = SimulatedBackend::new();
        let mut device = open_stick(&backend);
        let id = device.descriptor().instance_id();

        let recorder = Rc::new(RefCell::new(Recorder::default()));
        device.add_listener(recorder.clone());

        backend.push_orphan_event(&id, 0x80);
        device.update();

        assert!(recorder.borrow().changes.is_empty());
    }

    #[test]
    fn reacquire_then_retry_delivers_the_event() {
        let backend = SimulatedBackend::new();
        let mut device = open_stick(&backend);
        let id = device.descriptor().instance_id();

        backend.push_event(&id, 2, 0x80);
        backend.fail_next_pull(&id, PullStatus::NeedsReacquire);
        device.update();

        let button = device.objects()[2].as_button().expect("button");
        assert!(button.is_pressed());
    }

    #[test]
    fn failed_reacquire_freezes_last_known_state() {
        let backend = SimulatedBackend::new();
        let mut device = open_stick(&backend);
        let id = device.descriptor().instance_id();

        backend.push_event(&id, 2, 0x80);
        device.update();
        assert!(device.objects()[2].as_button().unwrap().is_pressed());

        // Physically gone: pulls report lost acquisition, reacquire fails.
        backend.detach(&id);
        device.update();
        device.update();
        assert!(device.objects()[2].as_button().unwrap().is_pressed());
    }

    #[test]
    fn replug_under_same_identity_resumes() {
        let backend = SimulatedBackend::new();
        let mut device = open_stick(&backend);
        let id = device.descriptor().instance_id();

        backend.detach(&id);
        device.update();

        backend.attach(stick());
        backend.push_event(&id, 2, 0x80);
        device.update();
        assert!(device.objects()[2].as_button().unwrap().is_pressed());
    }

    #[test]
    fn overflow_batch_is_accepted_and_counted() {
        let backend = SimulatedBackend::new();
        let mut device = open_stick(&backend);
        let id = device.descriptor().instance_id();

        backend.push_event(&id, 2, 0x80);
        backend.fail_next_pull(&id, PullStatus::Overflow);
        device.update();

        assert!(device.objects()[2].as_button().unwrap().is_pressed());
        assert_eq!(device.overflow_count(), 1);
    }

    #[test]
    fn listener_can_remove_another_during_dispatch() {
        struct Remover {
            victim: ListenerHandle,
        }
        impl DeviceListener for Remover {
            fn on_object_changed(&mut self, device: &Device, _object: &InputObject) {
                device.remove_listener(&self.victim);
            }
        }

        let backend = SimulatedBackend::new();
        let mut device = open_stick(&backend);
        let id = device.descriptor().instance_id();

        let victim: Rc<RefCell<Recorder>> = Rc::new(RefCell::new(Recorder::default()));
        let victim_handle: ListenerHandle = victim.clone();
        device.add_listener(Rc::new(RefCell::new(Remover {
            victim: victim_handle.clone(),
        })));
        device.add_listener(victim_handle);

        backend.push_event(&id, 2, 0x80);
        device.update();
        // The victim was in the dispatch snapshot, so it still saw this one.
        assert_eq!(victim.borrow().changes.len(), 1);

        backend.push_event(&id, 2, 0x00);
        device.update();
        assert_eq!(victim.borrow().changes.len(), 1);
    }

    #[test]
    fn remove_listener_reports_membership() {
        let backend = SimulatedBackend::new();
        let device = open_stick(&backend);

        let listener: ListenerHandle = Rc::new(RefCell::new(Recorder::default()));
        device.add_listener(listener.clone());
        assert!(device.remove_listener(&listener));
        assert!(!device.remove_listener(&listener));
    }

    #[test]
    fn open_failure_surfaces_as_error() {
        let backend = SimulatedBackend::new();
        let id = backend.attach(stick());
        let descriptor = backend.descriptor_of(&id).unwrap();
        backend.fail_next_open(&id);
        assert!(Device::open(&backend, descriptor).is_err());
    }

    #[test]
    fn detached_descriptor_does_not_open() {
        let backend = SimulatedBackend::new();
        backend.attach(stick());
        let ghost = backend.descriptor_of(&DeviceId::new(1)).unwrap();
        backend.detach(&DeviceId::new(1));
        assert!(Device::open(&backend, ghost).is_err());
    }
}
