//! Backend implementations.
//!
//! The core talks to hardware exclusively through the traits in
//! [`backend`](crate::backend); platform stacks live out of tree and plug in
//! at [`DeviceManager::new`](crate::manager::DeviceManager::new). The one
//! implementation shipped here is the scriptable [`simulated`] backend,
//! which tests and synthetic-roster hosts drive directly.

pub mod simulated;
