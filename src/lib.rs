//! ds3-bridge - DualShock 3 USB gadget bridge
//!
//! Emulates a Sony DualShock 3 on a Linux host through the USB gadget
//! subsystem and bridges one remote TCP client to the emulated pad: the
//! client feeds input reports in, the host's rumble/LED output is mirrored
//! back out.

pub mod bridge;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod function;
pub mod otg;
pub mod report;
pub mod staging;

pub use controller::Ds3Controller;
pub use error::{BridgeError, Result};
