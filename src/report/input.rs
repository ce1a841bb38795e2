//! Input report (controller to host), report ID 0x01.
//!
//! Layout of the 49-byte buffer:
//! ```text
//! [0]      report ID (0x01)
//! [2..5)   button bitfield, 3 bytes, little-endian bit order
//! [6..10)  left/right stick axes (LX, LY, RX, RY), centered at 127
//! [10..26) analog pressure slots
//! [31]     constant 0x05
//! [41..47) accelerometer/gyro packed as three big-endian 10-bit values
//! ```
//! Everything else is zero. The leading report ID is part of the buffer and
//! is written to the endpoint as-is; raw FunctionFS endpoints do not prepend
//! report IDs.

use super::button::Button;

/// Input report length including the leading report ID.
pub const INPUT_REPORT_LEN: usize = 49;

/// Number of bytes of the report carried by a client frame.
pub const INPUT_FRAME_LEN: usize = 48;

const STICK_CENTER: u8 = 127;
const MOTION_REST: u16 = 511;
const MOTION_MAX: u16 = 1023;
const MOTION_OFFSET: usize = 41;
const BUTTON_OFFSET: usize = 2;
const STICK_OFFSET: usize = 6;

/// The emulated pad's input state as a wire-ready buffer.
#[derive(Debug, Clone)]
pub struct InputReport {
    bytes: [u8; INPUT_REPORT_LEN],
}

impl InputReport {
    pub fn new() -> Self {
        let mut bytes = [0u8; INPUT_REPORT_LEN];
        bytes[0] = 0x01;
        bytes[STICK_OFFSET..STICK_OFFSET + 4].fill(STICK_CENTER);
        bytes[31] = 0x05;
        let mut report = Self { bytes };
        report.set_motion([MOTION_REST; 3]);
        report
    }

    /// Raw report bytes.
    pub fn bytes(&self) -> &[u8; INPUT_REPORT_LEN] {
        &self.bytes
    }

    /// Press or release a button.
    ///
    /// Updates the bitfield, and for pressure-capable buttons also writes the
    /// pressure slot: `pressure` (255 when not given) on press, 0 on release.
    pub fn set_button(&mut self, button: Button, pressed: bool, pressure: Option<u8>) {
        let bit = button.bit() as usize;
        let byte = BUTTON_OFFSET + bit / 8;
        let mask = 1u8 << (bit % 8);
        if pressed {
            self.bytes[byte] |= mask;
        } else {
            self.bytes[byte] &= !mask;
        }

        if let Some(offset) = button.pressure_offset() {
            self.bytes[offset] = if pressed { pressure.unwrap_or(255) } else { 0 };
        }
    }

    /// Whether a button is currently pressed.
    pub fn button_pressed(&self, button: Button) -> bool {
        let bit = button.bit() as usize;
        self.bytes[BUTTON_OFFSET + bit / 8] & (1 << (bit % 8)) != 0
    }

    /// Set the left stick axes.
    pub fn set_left_stick(&mut self, x: u8, y: u8) {
        self.bytes[STICK_OFFSET] = x;
        self.bytes[STICK_OFFSET + 1] = y;
    }

    /// Set the right stick axes.
    pub fn set_right_stick(&mut self, x: u8, y: u8) {
        self.bytes[STICK_OFFSET + 2] = x;
        self.bytes[STICK_OFFSET + 3] = y;
    }

    /// Set the three motion-sensor values (clamped to 10 bits, big-endian).
    pub fn set_motion(&mut self, values: [u16; 3]) {
        for (i, value) in values.iter().enumerate() {
            let clamped = (*value).min(MOTION_MAX);
            let offset = MOTION_OFFSET + i * 2;
            self.bytes[offset] = (clamped >> 8) as u8;
            self.bytes[offset + 1] = (clamped & 0xFF) as u8;
        }
    }

    /// Overwrite the first 48 bytes with a client frame.
    ///
    /// The frame's leading opcode byte doubles as the report ID and is copied
    /// unchanged; byte 48 is left untouched.
    pub fn apply_frame(&mut self, frame: &[u8; INPUT_FRAME_LEN]) {
        self.bytes[..INPUT_FRAME_LEN].copy_from_slice(frame);
    }
}

impl Default for InputReport {
    fn default() -> Self {
        Self::new()
    }
}
