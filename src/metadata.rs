//! Device metadata snapshot.
//!
//! [`DeviceMeta`] is a lightweight, cloneable summary of one tracked device
//! suitable for UI display, logging and diagnostics dumps. It is derived
//! from the device's descriptor and object table at the moment of the call;
//! it does not track later state changes.

use serde::{Deserialize, Serialize};

use crate::descriptor::DeviceKind;

/// Snapshot summary of a single device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// Stable instance id, rendered as hex.
    pub instance_id: String,

    /// Human-readable instance name.
    pub instance_name: String,

    /// Human-readable product name.
    pub product_name: String,

    /// Coarse device classification.
    pub kind: DeviceKind,

    /// Platform-specific subtype within `kind`.
    pub subkind: u16,

    /// Channel counts, as enumerated at device construction.
    pub axes: usize,
    pub buttons: usize,
    pub povs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_serializes_to_json() {
        let meta = DeviceMeta {
            instance_id: "0000000000000000000000000000002a".to_string(),
            instance_name: "Flight Stick".to_string(),
            product_name: "Maker Flight Stick Pro".to_string(),
            kind: DeviceKind::Flight,
            subkind: 1,
            axes: 4,
            buttons: 12,
            povs: 1,
        };
        let json = serde_json::to_string(&meta).expect("serialize");
        let back: DeviceMeta = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, meta);
    }
}
