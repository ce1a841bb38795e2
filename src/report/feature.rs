//! Feature report codecs and the configuration state behind them.
//!
//! Every feature response is exactly 64 bytes. The constructors reproduce the
//! byte layouts the PS3 host driver expects, including the places where one
//! field range overwrites part of another.

use tracing::debug;

use super::flash::FlashMemory;
use crate::error::{BridgeError, Result};

/// Feature report length on the wire.
pub const FEATURE_REPORT_LEN: usize = 64;

/// Controller information (flash header + stick metadata).
pub const FEATURE_CONTROLLER_INFO: u8 = 0x01;
/// Flash block read at the current pointer.
pub const FEATURE_FLASH_READ: u8 = 0xF1;
/// Device identity (MAC, serial, PCB revision).
pub const FEATURE_DEVICE_INFO: u8 = 0xF2;
/// Control commands (streaming, motion, restart).
pub const FEATURE_CONTROL: u8 = 0xF4;
/// Pairing information (paired host MAC).
pub const FEATURE_PAIRING_INFO: u8 = 0xF5;
/// Extended sensor configuration.
pub const FEATURE_SENSOR_EXT: u8 = 0xEF;
/// Sensor configuration.
pub const FEATURE_SENSOR_CONFIG: u8 = 0xF7;
/// Sensor status.
pub const FEATURE_SENSOR_STATUS: u8 = 0xF8;

const DEFAULT_DEVICE_MAC: [u8; 6] = [0x00, 0x21, 0x4F, 0x5C, 0x42, 0x17];
const DEFAULT_SERIAL: u32 = 0x0004_1C27;
const DEFAULT_CONTROLLER_TYPE: u8 = 0x03;
const DEFAULT_PCB_REVISION: u8 = 0x04;

/// Flash access sub-command carried in byte 1 of a 0xF1 set.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FlashCommand {
    /// 0x0B: select bank (byte 4) and address (byte 5).
    SetAddress { bank: u8, addr: u8 },
    /// 0x0A: write the payload from byte 7 on at the current pointer.
    Write(Vec<u8>),
}

impl FlashCommand {
    fn parse(data: &[u8]) -> Result<Self> {
        match data.get(1) {
            Some(0x0B) => {
                let bank = data.get(4).copied().unwrap_or(0);
                let addr = data.get(5).copied().unwrap_or(0);
                Ok(FlashCommand::SetAddress { bank, addr })
            }
            Some(0x0A) => {
                let payload = data.get(7..).unwrap_or(&[]).to_vec();
                Ok(FlashCommand::Write(payload))
            }
            other => Err(BridgeError::Protocol(format!(
                "unknown flash sub-command {:02X?}",
                other
            ))),
        }
    }
}

/// Control sub-command carried in byte 1 of a 0xF4 set, behind the 0x42
/// prefix at byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlCommand {
    DisableReports,
    EnableReports,
    EnableMotion,
    Restart,
    Shutdown,
    Startup,
}

impl ControlCommand {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.first() != Some(&0x42) {
            return Err(BridgeError::Protocol(format!(
                "control command without 0x42 prefix: {:02X?}",
                data.first()
            )));
        }
        match data.get(1) {
            Some(0x01) => Ok(ControlCommand::DisableReports),
            Some(0x02) => Ok(ControlCommand::EnableReports),
            Some(0x03) => Ok(ControlCommand::EnableMotion),
            Some(0x04) => Ok(ControlCommand::Restart),
            Some(0x0B) => Ok(ControlCommand::Shutdown),
            Some(0x0C) => Ok(ControlCommand::Startup),
            other => Err(BridgeError::Protocol(format!(
                "unknown control sub-command {:02X?}",
                other
            ))),
        }
    }
}

/// Feature-level controller state: flash banks, runtime state word, device
/// identity, and pairing.
#[derive(Debug, Clone)]
pub struct FeatureState {
    flash: FlashMemory,
    state: [u8; 4],
    device_mac: [u8; 6],
    paired_mac: [u8; 6],
    serial: u32,
    controller_type: u8,
    pcb_revision: u8,
}

impl FeatureState {
    pub fn new() -> Self {
        Self {
            flash: FlashMemory::new(),
            state: [0u8; 4],
            device_mac: DEFAULT_DEVICE_MAC,
            paired_mac: [0u8; 6],
            serial: DEFAULT_SERIAL,
            controller_type: DEFAULT_CONTROLLER_TYPE,
            pcb_revision: DEFAULT_PCB_REVISION,
        }
    }

    /// Input streaming is on only while the state word says so.
    pub fn input_streaming_enabled(&self) -> bool {
        self.state[1] == 0x01
    }

    // ─── GET constructors ────────────────────────────────────────────────

    /// 0x01: controller information.
    pub fn controller_information(&self) -> [u8; FEATURE_REPORT_LEN] {
        let mut r = [0u8; FEATURE_REPORT_LEN];
        let a = self.flash.bank_a();
        r[1] = 0x01;
        r[2..6].copy_from_slice(&a[1..5]);
        r[6..50].copy_from_slice(&a[0x60..0x8C]);
        r
    }

    /// 0xF1: 16-byte flash block at the current pointer.
    pub fn flash_read(&self) -> [u8; FEATURE_REPORT_LEN] {
        let mut r = [0u8; FEATURE_REPORT_LEN];
        r[0..5].copy_from_slice(&[0x57, 0x01, 0xFF, 0xFF, 0x10]);
        r[5..21].copy_from_slice(&self.flash.read_block());
        r
    }

    /// 0xF2: device information.
    pub fn device_info(&self) -> [u8; FEATURE_REPORT_LEN] {
        let mut r = [0u8; FEATURE_REPORT_LEN];
        r[0..4].copy_from_slice(&[0xF2, 0xFF, 0xFF, 0x00]);
        for (i, byte) in self.device_mac.iter().rev().enumerate() {
            r[4 + i] = *byte;
        }
        r[10] = 0x00;
        r[11] = self.controller_type;
        r[12..16].copy_from_slice(&self.serial.to_le_bytes());
        r[16] = self.pcb_revision;
        r[17..48].copy_from_slice(&self.flash.bank_a()[0x6C..0x8B]);
        r
    }

    /// 0xF5: pairing information.
    pub fn pairing_info(&self) -> [u8; FEATURE_REPORT_LEN] {
        let mut r = [0u8; FEATURE_REPORT_LEN];
        r[0] = 0x01;
        r[1] = 0x00;
        r[2..8].copy_from_slice(&self.paired_mac);
        r[8] = self.device_mac[1];
        r[9] = self.device_mac[0];
        r[10] = 0x00;
        r[11] = self.controller_type;
        r[12..16].copy_from_slice(&self.serial.to_le_bytes());
        r[16] = self.pcb_revision;
        r[17..48].copy_from_slice(&self.flash.bank_a()[0x6C..0x8B]);
        r
    }

    /// 0xEF: extended sensor configuration.
    pub fn sensor_ext(&self) -> [u8; FEATURE_REPORT_LEN] {
        let mut r = [0u8; FEATURE_REPORT_LEN];
        let a = self.flash.bank_a();
        r[1] = 0xEF;
        r[2..6].copy_from_slice(&a[1..5]);
        // the state word overlaps the tail of the header range
        r[5..9].copy_from_slice(&self.state);
        copy_wrapping(&mut r[0x11..0x21], self.flash.bank_b(), self.state[2]);
        r[0x30] = 0x05;
        r
    }

    /// 0xF7: sensor configuration.
    pub fn sensor_config(&self) -> [u8; FEATURE_REPORT_LEN] {
        let mut r = [0u8; FEATURE_REPORT_LEN];
        r[0x07] = 0xFF;
        r[0x11..0x25].copy_from_slice(&self.flash.bank_a()[0x8C..0xA0]);
        r[0x30] = 0x05;
        r
    }

    /// 0xF8: sensor status.
    pub fn sensor_status(&self) -> [u8; FEATURE_REPORT_LEN] {
        let mut r = [0u8; FEATURE_REPORT_LEN];
        r[1] = 0x01;
        r[4] = self.flash.bank_a()[3];
        r[5..9].copy_from_slice(&self.state);
        copy_wrapping(&mut r[0x11..0x21], self.flash.bank_b(), self.state[2]);
        r[0x30] = 0x05;
        r
    }

    // ─── SET handlers ────────────────────────────────────────────────────

    /// SET 0xF1: flash pointer/write commands.
    pub fn apply_flash_command(&mut self, data: &[u8]) -> Result<()> {
        match FlashCommand::parse(data)? {
            FlashCommand::SetAddress { bank, addr } => {
                debug!("flash pointer set: bank {} addr 0x{:02X}", bank & 0x01, addr);
                self.flash.select(bank, addr);
            }
            FlashCommand::Write(payload) => {
                debug!(
                    "flash write: {} bytes at bank {} addr 0x{:02X}",
                    payload.len().min(16),
                    self.flash.bank(),
                    self.flash.addr()
                );
                self.flash.write(&payload);
            }
        }
        Ok(())
    }

    /// SET 0xF4: control commands.
    pub fn apply_control_command(&mut self, data: &[u8]) -> Result<()> {
        let command = ControlCommand::parse(data)?;
        debug!("control command: {:?}", command);
        match command {
            ControlCommand::DisableReports => self.state[1] = 0x00,
            ControlCommand::EnableReports | ControlCommand::Startup => self.state[1] = 0x01,
            ControlCommand::EnableMotion => self.state[1] = 0x03,
            ControlCommand::Restart | ControlCommand::Shutdown => {
                self.state = [0u8; 4];
                self.flash.reset_pointer();
            }
        }
        Ok(())
    }

    /// SET 0xF5: re-pair to the host MAC at bytes [2..8).
    pub fn set_paired_mac(&mut self, data: &[u8]) -> Result<()> {
        let mac = data
            .get(2..8)
            .ok_or_else(|| BridgeError::Protocol("pairing payload too short".into()))?;
        self.paired_mac.copy_from_slice(mac);
        debug!("paired MAC set to {:02X?}", self.paired_mac);
        Ok(())
    }

    /// SET 0xEF: replace the state word with bytes [4..8).
    pub fn set_sensor_state(&mut self, data: &[u8]) -> Result<()> {
        let state = data
            .get(4..8)
            .ok_or_else(|| BridgeError::Protocol("sensor state payload too short".into()))?;
        self.state.copy_from_slice(state);
        Ok(())
    }
}

impl Default for FeatureState {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy `dst.len()` bytes out of `src` starting at `start`, wrapping at the
/// end of `src`.
fn copy_wrapping(dst: &mut [u8], src: &[u8], start: u8) {
    for (i, slot) in dst.iter_mut().enumerate() {
        *slot = src[(start as usize + i) % src.len()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::flash::{FLASH_BANK_A, FLASH_BANK_B};

    #[test]
    fn test_all_responses_are_64_bytes() {
        let state = FeatureState::new();
        assert_eq!(state.controller_information().len(), FEATURE_REPORT_LEN);
        assert_eq!(state.flash_read().len(), FEATURE_REPORT_LEN);
        assert_eq!(state.device_info().len(), FEATURE_REPORT_LEN);
        assert_eq!(state.pairing_info().len(), FEATURE_REPORT_LEN);
        assert_eq!(state.sensor_ext().len(), FEATURE_REPORT_LEN);
        assert_eq!(state.sensor_config().len(), FEATURE_REPORT_LEN);
        assert_eq!(state.sensor_status().len(), FEATURE_REPORT_LEN);
    }

    #[test]
    fn test_controller_information_layout() {
        let state = FeatureState::new();
        let r = state.controller_information();
        assert_eq!(r[0], 0x00);
        assert_eq!(r[1], 0x01);
        assert_eq!(&r[2..6], &FLASH_BANK_A[1..5]);
        assert_eq!(&r[6..50], &FLASH_BANK_A[0x60..0x8C]);
        assert_eq!(&r[50..], &[0u8; 14]);
    }

    #[test]
    fn test_flash_read_stick_calibration() {
        // point at the stick calibration block, then read it back
        let mut state = FeatureState::new();
        state
            .apply_flash_command(&[0x00, 0x0B, 0xFF, 0xFF, 0x00, 0x20, 0xFF])
            .unwrap();
        let r = state.flash_read();
        assert_eq!(&r[0..5], &[0x57, 0x01, 0xFF, 0xFF, 0x10]);
        assert_eq!(
            &r[5..21],
            &[
                0x01, 0xED, 0x01, 0xF7, 0x01, 0xDE, 0x01, 0xF8, 0x00, 0x01, 0x01, 0x60, 0x80,
                0x20, 0x15, 0x01
            ]
        );
    }

    #[test]
    fn test_flash_read_aligns_address() {
        let mut state = FeatureState::new();
        state
            .apply_flash_command(&[0x00, 0x0B, 0xFF, 0xFF, 0x01, 0x2C, 0xFF])
            .unwrap();
        let r = state.flash_read();
        assert_eq!(&r[5..21], &FLASH_BANK_B[0x20..0x30]);
    }

    #[test]
    fn test_flash_write_round_trip() {
        let mut state = FeatureState::new();
        state
            .apply_flash_command(&[0x00, 0x0B, 0x00, 0x00, 0x01, 0x40, 0x00])
            .unwrap();
        let mut write = vec![0x00, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00];
        let payload: Vec<u8> = (0u8..16).map(|i| 0xA0 + i).collect();
        write.extend_from_slice(&payload);
        state.apply_flash_command(&write).unwrap();
        let r = state.flash_read();
        assert_eq!(&r[5..21], &payload[..]);
    }

    #[test]
    fn test_unknown_flash_command() {
        let mut state = FeatureState::new();
        let err = state
            .apply_flash_command(&[0x00, 0x0C, 0x00, 0x00])
            .unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[test]
    fn test_device_info_layout() {
        let state = FeatureState::new();
        let r = state.device_info();
        assert_eq!(&r[0..4], &[0xF2, 0xFF, 0xFF, 0x00]);
        let mut reversed = DEFAULT_DEVICE_MAC;
        reversed.reverse();
        assert_eq!(&r[4..10], &reversed);
        assert_eq!(r[11], 0x03);
        assert_eq!(&r[12..16], &DEFAULT_SERIAL.to_le_bytes());
        assert_eq!(r[16], DEFAULT_PCB_REVISION);
        assert_eq!(&r[17..48], &FLASH_BANK_A[0x6C..0x8B]);
    }

    #[test]
    fn test_pairing_round_trip() {
        let mut state = FeatureState::new();
        let mut set = [0u8; 16];
        set[0] = 0x01;
        set[2..8].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        state.set_paired_mac(&set).unwrap();
        let r = state.pairing_info();
        assert_eq!(&r[2..8], &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        // first two device MAC bytes, reversed
        assert_eq!(r[8], DEFAULT_DEVICE_MAC[1]);
        assert_eq!(r[9], DEFAULT_DEVICE_MAC[0]);
    }

    #[test]
    fn test_pairing_rejects_short_payload() {
        let mut state = FeatureState::new();
        assert!(state.set_paired_mac(&[0x01, 0x00, 0xAA]).is_err());
    }

    #[test]
    fn test_control_streaming_flags() {
        let mut state = FeatureState::new();
        assert!(!state.input_streaming_enabled());

        state.apply_control_command(&[0x42, 0x02]).unwrap();
        assert!(state.input_streaming_enabled());

        state.apply_control_command(&[0x42, 0x01]).unwrap();
        assert!(!state.input_streaming_enabled());

        state.apply_control_command(&[0x42, 0x0C]).unwrap();
        assert!(state.input_streaming_enabled());

        // motion output is a distinct mode, not plain streaming
        state.apply_control_command(&[0x42, 0x03]).unwrap();
        assert!(!state.input_streaming_enabled());
        assert_eq!(state.state[1], 0x03);
    }

    #[test]
    fn test_control_restart_resets_state_and_pointer() {
        let mut state = FeatureState::new();
        state.apply_control_command(&[0x42, 0x02]).unwrap();
        state
            .apply_flash_command(&[0x00, 0x0B, 0x00, 0x00, 0x01, 0x80, 0x00])
            .unwrap();
        state.apply_control_command(&[0x42, 0x04]).unwrap();
        assert_eq!(state.state, [0u8; 4]);
        assert_eq!(state.flash.bank(), 0);
        assert_eq!(state.flash.addr(), 0);

        // shutdown behaves like restart
        state.apply_control_command(&[0x42, 0x02]).unwrap();
        state.apply_control_command(&[0x42, 0x0B]).unwrap();
        assert_eq!(state.state, [0u8; 4]);
    }

    #[test]
    fn test_control_rejects_bad_prefix_and_unknown() {
        let mut state = FeatureState::new();
        assert!(matches!(
            state.apply_control_command(&[0x41, 0x02]),
            Err(BridgeError::Protocol(_))
        ));
        assert!(matches!(
            state.apply_control_command(&[0x42, 0x07]),
            Err(BridgeError::Protocol(_))
        ));
    }

    #[test]
    fn test_sensor_ext_layout() {
        let mut state = FeatureState::new();
        state
            .set_sensor_state(&[0x00, 0x00, 0x00, 0x00, 0x11, 0x22, 0x90, 0x44])
            .unwrap();
        let r = state.sensor_ext();
        assert_eq!(r[1], 0xEF);
        // header bytes [2..5) survive; [5] is the first state byte
        assert_eq!(&r[2..5], &FLASH_BANK_A[1..4]);
        assert_eq!(&r[5..9], &[0x11, 0x22, 0x90, 0x44]);
        // bank B window starts at state[2]
        assert_eq!(&r[0x11..0x21], &FLASH_BANK_B[0x90..0xA0]);
        assert_eq!(r[0x30], 0x05);
    }

    #[test]
    fn test_sensor_ext_window_wraps() {
        let mut state = FeatureState::new();
        state
            .set_sensor_state(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF8, 0x00])
            .unwrap();
        let r = state.sensor_ext();
        assert_eq!(&r[0x11..0x19], &FLASH_BANK_B[0xF8..0x100]);
        assert_eq!(&r[0x19..0x21], &FLASH_BANK_B[0x00..0x08]);
    }

    #[test]
    fn test_sensor_config_layout() {
        let state = FeatureState::new();
        let r = state.sensor_config();
        assert_eq!(r[0x07], 0xFF);
        assert_eq!(&r[0x11..0x25], &FLASH_BANK_A[0x8C..0xA0]);
        assert_eq!(r[0x30], 0x05);
    }

    #[test]
    fn test_sensor_status_layout() {
        let mut state = FeatureState::new();
        state
            .set_sensor_state(&[0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x04])
            .unwrap();
        let r = state.sensor_status();
        assert_eq!(&r[0..5], &[0x00, 0x01, 0x00, 0x00, FLASH_BANK_A[3]]);
        assert_eq!(&r[5..9], &[0x01, 0x02, 0x00, 0x04]);
        assert_eq!(&r[0x11..0x21], &FLASH_BANK_B[0x00..0x10]);
        assert_eq!(r[0x30], 0x05);
    }
}
