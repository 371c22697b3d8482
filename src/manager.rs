//! Roster maintenance: the device manager.
//!
//! [`DeviceManager`] keeps the list of game controllers currently attached.
//! One [`tick`](DeviceManager::tick) per frame is the whole driving
//! contract: the manager asks its [`EnumerationTrigger`] whether the roster
//! needs a rescan, reconciles additions and removals against the platform's
//! attached-device snapshot, then updates every live device.
//!
//! Hosts observe the roster through [`ManagerListener`] callbacks:
//! `on_device_connected` after a device is opened and tracked,
//! `on_device_disconnecting` before a removed device's resources are
//! released. Both run synchronously inside `tick()`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{Backend, DeviceClass};
use crate::descriptor::{DeviceDescriptor, ProductId};
use crate::device::Device;
use crate::trigger::EnumerationTrigger;

/// Identity-classification collaborator.
///
/// Some controllers are reachable through more than one input API; a probe
/// recognizes product identifiers that are already served through an
/// alternate family so one physical unit is not reported twice.
pub trait FamilyProbe {
    fn is_alternate_family(&self, product: &ProductId) -> bool;
}

/// Receives roster-change notifications.
///
/// Registering or removing listeners from within a callback is safe; device
/// listeners may also be registered on the delivered [`Device`] right away.
pub trait ManagerListener {
    fn on_device_connected(&mut self, _manager: &DeviceManager, _device: &Device) {}
    fn on_device_disconnecting(&mut self, _manager: &DeviceManager, _device: &Device) {}
}

type ListenerHandle = Rc<RefCell<dyn ManagerListener>>;

/// Maintains the roster of attached game controllers.
pub struct DeviceManager {
    backend: Rc<dyn Backend>,
    trigger: Box<dyn EnumerationTrigger>,
    family_probe: Option<Box<dyn FamilyProbe>>,
    devices: Vec<(DeviceDescriptor, Device)>,
    listeners: RefCell<Vec<ListenerHandle>>,
}

impl DeviceManager {
    /// The backend is shared (`Rc`): several managers may run over one
    /// platform context, and the last clone dropped tears it down.
    pub fn new(backend: Rc<dyn Backend>, trigger: Box<dyn EnumerationTrigger>) -> Self {
        Self {
            backend,
            trigger,
            family_probe: None,
            devices: Vec::new(),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Like [`new`](Self::new), with a [`FamilyProbe`] excluding devices
    /// already served through an alternate input family.
    pub fn with_family_probe(
        backend: Rc<dyn Backend>,
        trigger: Box<dyn EnumerationTrigger>,
        probe: Box<dyn FamilyProbe>,
    ) -> Self {
        let mut manager = Self::new(backend, trigger);
        manager.family_probe = Some(probe);
        manager
    }

    /// Drive everything once: rescan the roster if the trigger says so,
    /// then update every tracked device in stable order.
    pub fn tick(&mut self) {
        if self.trigger.enumeration_needed() {
            self.reconcile();
        }
        for (_, device) in &mut self.devices {
            device.update();
        }
    }

    /// Diff the tracked roster against the platform's current snapshot and
    /// apply additions and removals.
    ///
    /// Idempotent for an unchanged snapshot. If enumeration itself fails
    /// the previous roster is kept for this pass: a platform hiccup is not
    /// the same thing as every device unplugging at once.
    pub fn reconcile(&mut self) {
        let snapshot = match self.backend.list_attached(DeviceClass::GameControllers) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("device enumeration failed: {err}");
                return;
            }
        };

        let current: Vec<DeviceDescriptor> = snapshot
            .into_iter()
            .filter(|descriptor| self.accepts(descriptor))
            .collect();
        let previous: Vec<DeviceDescriptor> =
            self.devices.iter().map(|(descriptor, _)| descriptor.clone()).collect();

        let added: Vec<DeviceDescriptor> = current
            .iter()
            .filter(|descriptor| !previous.contains(descriptor))
            .cloned()
            .collect();
        let removed: Vec<DeviceDescriptor> = previous
            .iter()
            .filter(|descriptor| !current.contains(descriptor))
            .cloned()
            .collect();

        for descriptor in added {
            self.add_device(descriptor);
        }
        for descriptor in removed {
            self.remove_device(&descriptor);
        }
    }

    /// Roster admission: game-controller kinds only (the platform may
    /// report mice and keyboards as attached regardless of the class
    /// filter), minus anything the family probe claims.
    fn accepts(&self, descriptor: &DeviceDescriptor) -> bool {
        if !descriptor.kind().is_game_controller() {
            return false;
        }
        if let Some(probe) = &self.family_probe {
            if probe.is_alternate_family(&descriptor.product_id()) {
                log::debug!(
                    "excluding '{}': served through an alternate input family",
                    descriptor.instance_name()
                );
                return false;
            }
        }
        true
    }

    fn add_device(&mut self, descriptor: DeviceDescriptor) {
        let device = match Device::open(self.backend.as_ref(), descriptor.clone()) {
            Ok(device) => device,
            Err(err) => {
                // Skip this descriptor and keep reconciling the rest.
                log::warn!("skipping '{}': {err}", descriptor.instance_name());
                return;
            }
        };
        log::debug!("device connected: '{}'", descriptor.instance_name());
        self.devices.push((descriptor, device));
        if let Some((_, device)) = self.devices.last() {
            self.notify_connected(device);
        }
    }

    fn remove_device(&mut self, descriptor: &DeviceDescriptor) {
        let Some(position) = self.devices.iter().position(|(d, _)| d == descriptor) else {
            return;
        };
        log::debug!("device disconnecting: '{}'", descriptor.instance_name());
        // Listeners run before the device is torn down, while its state is
        // still readable and it is still on the roster.
        self.notify_disconnecting(&self.devices[position].1);
        self.devices.remove(position);
    }

    /// The tracked roster, in connection order.
    pub fn devices(&self) -> &[(DeviceDescriptor, Device)] {
        &self.devices
    }

    /// Linear scan by instance name; first match wins.
    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|(descriptor, _)| descriptor.instance_name() == name)
            .map(|(_, device)| device)
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

    fn notify_connected(&self, device: &Device) {
        let snapshot: Vec<ListenerHandle> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener.borrow_mut().on_device_connected(self, device);
        }
    }

    fn notify_disconnecting(&self, device: &Device) {
        let snapshot: Vec<ListenerHandle> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener.borrow_mut().on_device_disconnecting(self, device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::{SimDevice, SimulatedBackend};
    use crate::descriptor::{DeviceId, DeviceKind};
    use crate::trigger::IntervalEnumerationTrigger;
    use std::time::Duration;

    fn stick(id: u128, name: &str) -> SimDevice {
        SimDevice::new(id, 0x1000 + id as u32, name, "Maker Stick")
            .axis("X Axis", 0, 65535)
            .button("Trigger")
    }

    /// A trigger with interval zero fires on every tick, which keeps these
    /// tests free of wall-clock concerns.
    fn manager(backend: &Rc<SimulatedBackend>) -> DeviceManager {
        DeviceManager::new(
            backend.clone(),
            Box::new(IntervalEnumerationTrigger::new(Duration::ZERO)),
        )
    }

    #[derive(Default)]
    struct RosterRecorder {
        connected: Vec<String>,
        disconnecting: Vec<String>,
        roster_size_at_disconnect: Vec<usize>,
    }

    impl ManagerListener for RosterRecorder {
        fn on_device_connected(&mut self, _manager: &DeviceManager, device: &Device) {
            self.connected.push(device.descriptor().instance_name().to_string());
        }

        fn on_device_disconnecting(&mut self, manager: &DeviceManager, device: &Device) {
            self.disconnecting
                .push(device.descriptor().instance_name().to_string());
            // The device must still be tracked and readable at this point.
            self.roster_size_at_disconnect.push(manager.devices().len());
            assert!(!device.objects().is_empty());
        }
    }

    #[test]
    fn rescan_adds_newly_attached_devices() {
        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = manager(&backend);
        let recorder = Rc::new(RefCell::new(RosterRecorder::default()));
        manager.add_listener(recorder.clone());

        backend.attach(stick(1, "Stick A"));
        manager.tick();
        assert_eq!(manager.devices().len(), 1);

        backend.attach(stick(2, "Stick B"));
        manager.tick();
        assert_eq!(manager.devices().len(), 2);
        assert_eq!(recorder.borrow().connected, ["Stick A", "Stick B"]);
        assert!(recorder.borrow().disconnecting.is_empty());
    }

    #[test]
    fn rescan_removes_detached_devices_notifying_first() {
        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = manager(&backend);
        let recorder = Rc::new(RefCell::new(RosterRecorder::default()));
        manager.add_listener(recorder.clone());

        backend.attach(stick(1, "Stick A"));
        backend.attach(stick(2, "Stick B"));
        manager.tick();
        assert_eq!(manager.devices().len(), 2);

        backend.detach(&DeviceId::new(2));
        manager.tick();
        assert_eq!(manager.devices().len(), 1);
        let recorder = recorder.borrow();
        assert_eq!(recorder.disconnecting, ["Stick B"]);
        // Disconnect fired while B was still on the roster.
        assert_eq!(recorder.roster_size_at_disconnect, [2]);
    }

    #[test]
    fn reconcile_is_idempotent_for_unchanged_roster() {
        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = manager(&backend);
        let recorder = Rc::new(RefCell::new(RosterRecorder::default()));
        manager.add_listener(recorder.clone());

        backend.attach(stick(1, "Stick A"));
        manager.reconcile();
        manager.reconcile();
        manager.reconcile();

        assert_eq!(manager.devices().len(), 1);
        assert_eq!(recorder.borrow().connected.len(), 1);
        assert!(recorder.borrow().disconnecting.is_empty());
    }

    #[test]
    fn mice_and_keyboards_never_join_the_roster() {
        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = manager(&backend);

        backend.attach(stick(1, "Stick A"));
        backend.attach(
            SimDevice::new(2, 0x2000, "Desk Mouse", "Maker Mouse")
                .kind(DeviceKind::Mouse)
                .button("Left"),
        );
        backend.attach(
            SimDevice::new(3, 0x3000, "Desk Keyboard", "Maker Keyboard")
                .kind(DeviceKind::Keyboard)
                .button("Space"),
        );
        manager.tick();

        assert_eq!(manager.devices().len(), 1);
        assert!(manager.device_by_name("Desk Mouse").is_none());
    }

    #[test]
    fn family_probe_excludes_alternate_family_products() {
        struct EvenProductProbe;
        impl FamilyProbe for EvenProductProbe {
            fn is_alternate_family(&self, product: &ProductId) -> bool {
                product.raw() % 2 == 0
            }
        }

        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = DeviceManager::with_family_probe(
            backend.clone(),
            Box::new(IntervalEnumerationTrigger::new(Duration::ZERO)),
            Box::new(EvenProductProbe),
        );

        backend.attach(stick(1, "Odd Stick")); // product 0x1001
        backend.attach(stick(2, "Even Stick")); // product 0x1002
        manager.tick();

        assert_eq!(manager.devices().len(), 1);
        assert!(manager.device_by_name("Odd Stick").is_some());
        assert!(manager.device_by_name("Even Stick").is_none());
    }

    #[test]
    fn open_failure_skips_descriptor_and_keeps_going() {
        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = manager(&backend);

        let broken = backend.attach(stick(1, "Broken Stick"));
        backend.attach(stick(2, "Good Stick"));
        backend.fail_next_open(&broken);
        manager.tick();

        assert_eq!(manager.devices().len(), 1);
        assert!(manager.device_by_name("Good Stick").is_some());

        // The failed descriptor is retried on the next rescan.
        manager.tick();
        assert_eq!(manager.devices().len(), 2);
    }

    #[test]
    fn device_by_name_returns_first_match() {
        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = manager(&backend);

        backend.attach(stick(1, "Twin"));
        backend.attach(stick(2, "Twin"));
        manager.tick();

        let found = manager.device_by_name("Twin").expect("present");
        assert_eq!(found.descriptor().instance_id(), DeviceId::new(1));
        assert!(manager.device_by_name("Absent").is_none());
    }

    #[test]
    fn tick_updates_tracked_devices() {
        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = manager(&backend);

        let id = backend.attach(stick(1, "Stick A"));
        manager.tick();

        backend.push_event(&id, 1, 0x80);
        manager.tick();

        let device = manager.device_by_name("Stick A").expect("present");
        assert!(device.objects()[1].as_button().expect("button").is_pressed());
    }

    #[test]
    fn listener_removal_round_trip() {
        let backend = Rc::new(SimulatedBackend::new());
        let manager = manager(&backend);
        let listener: ListenerHandle = Rc::new(RefCell::new(RosterRecorder::default()));
        manager.add_listener(listener.clone());
        assert!(manager.remove_listener(&listener));
        assert!(!manager.remove_listener(&listener));
    }

    #[test]
    fn device_listener_registered_from_connect_callback_sees_events() {
        use crate::device::DeviceListener;
        use crate::object::InputObject;

        #[derive(Default)]
        struct ChangeCounter {
            changes: usize,
        }
        impl DeviceListener for ChangeCounter {
            fn on_object_changed(&mut self, _device: &Device, _object: &InputObject) {
                self.changes += 1;
            }
        }

        struct Registrar {
            counter: Rc<RefCell<ChangeCounter>>,
        }
        impl ManagerListener for Registrar {
            fn on_device_connected(&mut self, _manager: &DeviceManager, device: &Device) {
                device.add_listener(self.counter.clone());
            }
        }

        let backend = Rc::new(SimulatedBackend::new());
        let mut manager = manager(&backend);
        let counter = Rc::new(RefCell::new(ChangeCounter::default()));
        manager.add_listener(Rc::new(RefCell::new(Registrar {
            counter: counter.clone(),
        })));

        let id = backend.attach(stick(1, "Stick A"));
        manager.tick();
        backend.push_event(&id, 1, 0x80);
        manager.tick();

        assert_eq!(counter.borrow().changes, 1);
    }
}
