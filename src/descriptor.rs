//! Device and object descriptors.
//!
//! A descriptor is an immutable identity/metadata snapshot taken at
//! enumeration time:
//! - [`DeviceDescriptor`] identifies one physical device and is the unit of
//!   roster reconciliation: two descriptors compare equal iff their instance
//!   id *and* both raw name buffers match.
//! - [`ObjectDescriptor`] identifies one reporting channel (axis, button or
//!   hat) within a device via its raw [`ObjectTag`].
//!
//! Name strings are kept in the platform's native UTF-16 form and decoded
//! lazily (and cached) on first access; equality always compares the raw
//! buffers so that two devices with identical decoded names but different
//! raw bytes stay distinct.

use std::cell::OnceCell;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::strings;

/// Opaque stable identifier of one physical connection.
///
/// Stays stable for as long as the device remains plugged in; a replug under
/// the same identity yields the same id on platforms that support it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u128);

impl DeviceId {
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u128 {
        self.0
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({:032x})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Opaque identifier of a device model, stable across units of that model.
///
/// Exposed so an identity-classification collaborator (see
/// [`FamilyProbe`](crate::manager::FamilyProbe)) can recognize controller
/// families that are already served through another input API.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductId(u32);

impl ProductId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProductId({:08x})", self.0)
    }
}

/// Coarse device classification as reported by the platform.
///
/// The roster only tracks the game-controller kinds; the platform may still
/// report `Mouse`/`Keyboard` entries, which the manager filters out.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum DeviceKind {
    Joystick,
    Gamepad,
    FirstPerson,
    Driving,
    Flight,
    Mouse,
    Keyboard,
    Other(u8),
}

impl DeviceKind {
    /// Whether this kind belongs on the roster.
    pub fn is_game_controller(self) -> bool {
        matches!(
            self,
            DeviceKind::Joystick
                | DeviceKind::Gamepad
                | DeviceKind::FirstPerson
                | DeviceKind::Driving
                | DeviceKind::Flight
        )
    }
}

/// A name as the platform reports it: raw UTF-16 units plus a lazily
/// decoded, cached `String`. Equality is on the raw units only.
#[derive(Clone, Debug)]
struct RawName {
    units: Vec<u16>,
    decoded: OnceCell<String>,
}

impl RawName {
    fn new(units: Vec<u16>) -> Self {
        Self {
            units,
            decoded: OnceCell::new(),
        }
    }

    fn get(&self) -> &str {
        self.decoded
            .get_or_init(|| strings::decode_utf16(&self.units))
    }
}

impl PartialEq for RawName {
    fn eq(&self, other: &Self) -> bool {
        self.units == other.units
    }
}

impl Eq for RawName {}

/// Identity and metadata snapshot of one physical device.
///
/// Immutable after creation. Cloning is cheap enough for per-reconcile
/// roster snapshots (the decoded-name cache is cloned along).
#[derive(Clone, Debug)]
pub struct DeviceDescriptor {
    instance_id: DeviceId,
    product_id: ProductId,
    instance_name: RawName,
    product_name: RawName,
    kind: DeviceKind,
    subkind: u16,
}

impl DeviceDescriptor {
    pub fn new(
        instance_id: DeviceId,
        product_id: ProductId,
        raw_instance_name: Vec<u16>,
        raw_product_name: Vec<u16>,
        kind: DeviceKind,
        subkind: u16,
    ) -> Self {
        Self {
            instance_id,
            product_id,
            instance_name: RawName::new(raw_instance_name),
            product_name: RawName::new(raw_product_name),
            kind,
            subkind,
        }
    }

    pub fn instance_id(&self) -> DeviceId {
        self.instance_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Human-readable instance name, decoded on first call and cached.
    pub fn instance_name(&self) -> &str {
        self.instance_name.get()
    }

    /// Human-readable product name, decoded on first call and cached.
    pub fn product_name(&self) -> &str {
        self.product_name.get()
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn subkind(&self) -> u16 {
        self.subkind
    }
}

impl PartialEq for DeviceDescriptor {
    /// Structural identity: instance id plus both raw name buffers.
    ///
    /// This is the partition reconciliation diffs the roster with, so a
    /// device can never land in both the added and the removed set of one
    /// reconcile pass.
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
            && self.instance_name == other.instance_name
            && self.product_name == other.product_name
    }
}

impl Eq for DeviceDescriptor {}

/// Raw type/index tag of a reporting channel.
///
/// Layout mirrors the packed form platform APIs hand out:
/// - bits 0..8 — capability bits ([`ObjectTag::AXIS`], [`ObjectTag::BUTTON`],
///   [`ObjectTag::POV`]); masks can combine, so the capability queries are
///   not mutually exclusive.
/// - bits 8..24 — per-type index within the device. Indices may have gaps
///   (a device can report button 5 with no button 4).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectTag(u32);

impl ObjectTag {
    pub const ABS_AXIS: u32 = 0x0000_0001;
    pub const REL_AXIS: u32 = 0x0000_0002;
    pub const AXIS: u32 = Self::ABS_AXIS | Self::REL_AXIS;
    pub const PUSH_BUTTON: u32 = 0x0000_0004;
    pub const TOGGLE_BUTTON: u32 = 0x0000_0008;
    pub const BUTTON: u32 = Self::PUSH_BUTTON | Self::TOGGLE_BUTTON;
    pub const POV: u32 = 0x0000_0010;

    const TYPE_MASK: u32 = 0x0000_00FF;
    const INDEX_SHIFT: u32 = 8;

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Tag for an absolute axis with the given per-type index.
    pub const fn axis(index: u16) -> Self {
        Self(Self::ABS_AXIS | (index as u32) << Self::INDEX_SHIFT)
    }

    /// Tag for a push button with the given per-type index.
    pub const fn button(index: u16) -> Self {
        Self(Self::PUSH_BUTTON | (index as u32) << Self::INDEX_SHIFT)
    }

    /// Tag for a POV hat with the given per-type index.
    pub const fn pov(index: u16) -> Self {
        Self(Self::POV | (index as u32) << Self::INDEX_SHIFT)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Index of this channel among channels of the same type.
    pub const fn index(self) -> u16 {
        (self.0 >> Self::INDEX_SHIFT) as u16
    }

    const fn type_bits(self) -> u32 {
        self.0 & Self::TYPE_MASK
    }

    pub const fn is_axis(self) -> bool {
        self.type_bits() & Self::AXIS != 0
    }

    pub const fn is_button(self) -> bool {
        self.type_bits() & Self::BUTTON != 0
    }

    pub const fn is_pov(self) -> bool {
        self.type_bits() & Self::POV != 0
    }
}

impl fmt::Debug for ObjectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectTag({:#x})", self.0)
    }
}

/// Identity and metadata snapshot of one reporting channel within a device.
#[derive(Clone, Debug)]
pub struct ObjectDescriptor {
    tag: ObjectTag,
    offset: u32,
    name: RawName,
}

impl ObjectDescriptor {
    pub fn new(tag: ObjectTag, offset: u32, raw_name: Vec<u16>) -> Self {
        Self {
            tag,
            offset,
            name: RawName::new(raw_name),
        }
    }

    pub fn tag(&self) -> ObjectTag {
        self.tag
    }

    /// Report offset the hardware stamps on events from this channel.
    /// Diagnostic only; dispatch goes through the event key.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Display name, decoded on first call and cached.
    pub fn name(&self) -> &str {
        self.name.get()
    }
}
