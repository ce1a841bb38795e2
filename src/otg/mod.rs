//! USB gadget layer: ConfigFS registration, FunctionFS descriptor upload,
//! and endpoint file handles for the emulated pad.

pub mod ffs;
pub mod gadget;

pub use ffs::{FfsEvent, SetupRequest};
pub use gadget::{Ds3Gadget, GadgetEndpoints, DEFAULT_CONFIGURED_TIMEOUT, PRODUCT_ID, VENDOR_ID};
