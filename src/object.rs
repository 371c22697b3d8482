//! Input objects: typed state of one reporting channel.
//!
//! [`InputObject`] is a sum over the three supported channel kinds. Each
//! variant decodes its raw event payload, applies change-deduplication and
//! reports back whether the stored state actually moved; the owning
//! [`Device`](crate::device::Device) turns that into listener notifications.
//!
//! ## Decoding conventions
//! - **Axis** — payload is the raw axis position, clamped into the range the
//!   hardware reported at enumeration time.
//! - **Button** — bit `0x80` of the payload decides pressed/released.
//! - **POV hat** — low 16 bits equal to `0xFFFF` mean centered; otherwise
//!   the payload is a clockwise angle in hundredths of a degree
//!   (`0..=35999`, 0 = forward).

use std::fmt;

use crate::backend::RawEvent;
use crate::descriptor::ObjectDescriptor;

/// Raw payload bit that encodes a pressed button.
const BUTTON_PRESSED_BIT: u32 = 0x80;

/// Low-16-bit sentinel a hat reports while centered.
const POV_CENTERED_SENTINEL: u32 = 0xFFFF;

/// Largest valid hat angle, in hundredths of a degree.
const POV_MAX_ANGLE: u32 = 35_999;

/// One reporting channel with typed, deduplicated state.
pub enum InputObject {
    Axis(Axis),
    Button(Button),
    Pov(Pov),
}

impl InputObject {
    pub fn descriptor(&self) -> &ObjectDescriptor {
        match self {
            InputObject::Axis(axis) => &axis.descriptor,
            InputObject::Button(button) => &button.descriptor,
            InputObject::Pov(pov) => &pov.descriptor,
        }
    }

    /// Decode `event` into this channel's state.
    ///
    /// Returns `true` iff the stored state changed (the dedup gate for
    /// listener notification).
    pub(crate) fn update_from(&mut self, event: &RawEvent) -> bool {
        match self {
            InputObject::Axis(axis) => axis.update_from(event),
            InputObject::Button(button) => button.update_from(event),
            InputObject::Pov(pov) => pov.update_from(event),
        }
    }

    pub fn as_axis(&self) -> Option<&Axis> {
        match self {
            InputObject::Axis(axis) => Some(axis),
            _ => None,
        }
    }

    pub fn as_button(&self) -> Option<&Button> {
        match self {
            InputObject::Button(button) => Some(button),
            _ => None,
        }
    }

    pub fn as_pov(&self) -> Option<&Pov> {
        match self {
            InputObject::Pov(pov) => Some(pov),
            _ => None,
        }
    }
}

impl fmt::Display for InputObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputObject::Axis(axis) => axis.fmt(f),
            InputObject::Button(button) => button.fmt(f),
            InputObject::Pov(pov) => pov.fmt(f),
        }
    }
}

/// A continuous channel with a fixed `[min, max]` range.
pub struct Axis {
    descriptor: ObjectDescriptor,
    value: i32,
    min: i32,
    max: i32,
}

impl Axis {
    /// Callers guarantee `min < max`; the device skips channels whose
    /// reported range is degenerate.
    pub(crate) fn new(descriptor: ObjectDescriptor, min: i32, max: i32) -> Self {
        // The hardware cannot report a true rest position before the first
        // physical event, so start at the midpoint of the range. The first
        // real event can therefore be far from this value.
        let value = min + (max - min) / 2;
        Self {
            descriptor,
            value,
            min,
            max,
        }
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn min_value(&self) -> i32 {
        self.min
    }

    pub fn max_value(&self) -> i32 {
        self.max
    }

    fn update_from(&mut self, event: &RawEvent) -> bool {
        self.set_value(event.value as i32)
    }

    fn set_value(&mut self, value: i32) -> bool {
        // Some drivers report outside the range they declared; correct
        // rather than reject.
        let value = value.clamp(self.min, self.max);
        if value == self.value {
            return false;
        }
        self.value = value;
        true
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Axis id:{} value:{} ({} to {}) name:'{}'",
            self.descriptor.tag().raw(),
            self.value,
            self.min,
            self.max,
            self.descriptor.name()
        )
    }
}

/// A two-state channel.
pub struct Button {
    descriptor: ObjectDescriptor,
    pressed: bool,
}

impl Button {
    pub(crate) fn new(descriptor: ObjectDescriptor) -> Self {
        Self {
            descriptor,
            pressed: false,
        }
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    fn update_from(&mut self, event: &RawEvent) -> bool {
        self.set_pressed((event.value & BUTTON_PRESSED_BIT) != 0)
    }

    fn set_pressed(&mut self, pressed: bool) -> bool {
        if pressed == self.pressed {
            return false;
        }
        self.pressed = pressed;
        true
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Button id:{} value:{} name:'{}'",
            self.descriptor.tag().raw(),
            self.pressed,
            self.descriptor.name()
        )
    }
}

/// A point-of-view hat: either centered, or pointing at a clockwise angle.
pub struct Pov {
    descriptor: ObjectDescriptor,
    centered: bool,
    angle: u32,
}

impl Pov {
    pub(crate) fn new(descriptor: ObjectDescriptor) -> Self {
        Self {
            descriptor,
            centered: true,
            angle: 0,
        }
    }

    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    pub fn is_centered(&self) -> bool {
        self.centered
    }

    /// Clockwise angle in hundredths of a degree, 0 = forward.
    ///
    /// The angle is meaningless while the hat is centered; reading it in
    /// that state is defined to return 0.
    pub fn angle(&self) -> u32 {
        if self.centered {
            return 0;
        }
        self.angle
    }

    fn update_from(&mut self, event: &RawEvent) -> bool {
        if (event.value & 0xFFFF) == POV_CENTERED_SENTINEL {
            self.set_value(true, 0)
        } else {
            self.set_value(false, event.value)
        }
    }

    fn set_value(&mut self, centered: bool, angle: u32) -> bool {
        debug_assert!(!centered || angle == 0);
        let angle = angle.min(POV_MAX_ANGLE);
        if centered == self.centered && angle == self.angle {
            return false;
        }
        self.centered = centered;
        self.angle = angle;
        true
    }
}

impl fmt::Display for Pov {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POV id:{}", self.descriptor.tag().raw())?;
        if self.centered {
            write!(f, " value:centered")?;
        } else {
            write!(f, " value:not-centered angle:{}", self.angle)?;
        }
        write!(f, " name:'{}'", self.descriptor.name())
    }
}
