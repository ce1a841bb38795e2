//! Emulated pad state: the three report buffers and the HID dispatch that
//! the gadget and the TCP bridge both drive.
//!
//! The buffers are shared between the gadget-side sampler and the bridge's
//! network tasks, so each sits behind its own mutex. Every lock is held only
//! for a copy of at most 64 bytes.

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{BridgeError, Result};
use crate::report::feature::{
    FEATURE_CONTROLLER_INFO, FEATURE_CONTROL, FEATURE_DEVICE_INFO, FEATURE_FLASH_READ,
    FEATURE_PAIRING_INFO, FEATURE_SENSOR_CONFIG, FEATURE_SENSOR_EXT, FEATURE_SENSOR_STATUS,
};
use crate::report::{
    Button, FeatureState, InputReport, OutputReport, ReportType, INPUT_FRAME_LEN,
    INPUT_REPORT_LEN, OUTPUT_REPORT_LEN,
};

/// The emulated DualShock 3.
pub struct Ds3Controller {
    input: Mutex<InputReport>,
    output: Mutex<OutputReport>,
    features: Mutex<FeatureState>,
}

impl Ds3Controller {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(InputReport::new()),
            output: Mutex::new(OutputReport::new()),
            features: Mutex::new(FeatureState::new()),
        }
    }

    /// Answer a `GET_REPORT` control request.
    pub fn get_report(&self, report_type: ReportType, id: u8) -> Result<Vec<u8>> {
        match (report_type, id) {
            (ReportType::Input, 0x01) => Ok(self.input.lock().bytes().to_vec()),
            (ReportType::Feature, FEATURE_CONTROLLER_INFO) => {
                Ok(self.features.lock().controller_information().to_vec())
            }
            (ReportType::Feature, FEATURE_FLASH_READ) => {
                Ok(self.features.lock().flash_read().to_vec())
            }
            (ReportType::Feature, FEATURE_DEVICE_INFO) => {
                Ok(self.features.lock().device_info().to_vec())
            }
            (ReportType::Feature, FEATURE_PAIRING_INFO) => {
                Ok(self.features.lock().pairing_info().to_vec())
            }
            (ReportType::Feature, FEATURE_SENSOR_EXT) => {
                Ok(self.features.lock().sensor_ext().to_vec())
            }
            (ReportType::Feature, FEATURE_SENSOR_CONFIG) => {
                Ok(self.features.lock().sensor_config().to_vec())
            }
            (ReportType::Feature, FEATURE_SENSOR_STATUS) => {
                Ok(self.features.lock().sensor_status().to_vec())
            }
            _ => Err(BridgeError::UnsupportedReport {
                report_type: report_type.as_wire(),
                id,
            }),
        }
    }

    /// Apply a `SET_REPORT` control request.
    pub fn set_report(&self, report_type: ReportType, id: u8, data: &[u8]) -> Result<()> {
        match (report_type, id) {
            (ReportType::Output, 0x01) => self.output.lock().update(data),
            (ReportType::Feature, FEATURE_FLASH_READ) => {
                self.features.lock().apply_flash_command(data)
            }
            (ReportType::Feature, FEATURE_CONTROL) => {
                self.features.lock().apply_control_command(data)
            }
            (ReportType::Feature, FEATURE_PAIRING_INFO) => {
                self.features.lock().set_paired_mac(data)
            }
            (ReportType::Feature, FEATURE_SENSOR_EXT) => {
                self.features.lock().set_sensor_state(data)
            }
            _ => Err(BridgeError::UnsupportedReport {
                report_type: report_type.as_wire(),
                id,
            }),
        }
    }

    /// Copy a 48-byte client frame into the input report.
    pub fn apply_input(&self, frame: &[u8]) -> Result<()> {
        if frame.len() != INPUT_FRAME_LEN {
            return Err(BridgeError::InvalidLength {
                expected: INPUT_FRAME_LEN,
                actual: frame.len(),
            });
        }
        let mut fixed = [0u8; INPUT_FRAME_LEN];
        fixed.copy_from_slice(frame);
        self.input.lock().apply_frame(&fixed);
        Ok(())
    }

    /// Snapshot of the full input report for the endpoint sampler.
    pub fn input_bytes(&self) -> [u8; INPUT_REPORT_LEN] {
        *self.input.lock().bytes()
    }

    /// Snapshot of the current output report for the client mirror.
    pub fn read_output(&self) -> [u8; OUTPUT_REPORT_LEN] {
        *self.output.lock().bytes()
    }

    /// Whether the host has enabled input streaming via the control report.
    pub fn input_streaming_enabled(&self) -> bool {
        self.features.lock().input_streaming_enabled()
    }

    /// Press or release a button (local input, e.g. the console).
    pub fn set_button(&self, button: Button, pressed: bool, pressure: Option<u8>) {
        self.input.lock().set_button(button, pressed, pressure);
    }

    /// Set both stick pairs at once (local input).
    pub fn set_sticks(&self, lx: u8, ly: u8, rx: u8, ry: u8) {
        let mut input = self.input.lock();
        input.set_left_stick(lx, ly);
        input.set_right_stick(rx, ry);
    }

    /// Consume one frame read from the OUT endpoint.
    ///
    /// Valid frames are the report ID 0x01 followed by exactly 48 bytes;
    /// anything else is logged and dropped.
    pub fn feed_endpoint_frame(&self, chunk: &[u8]) {
        match chunk.split_first() {
            Some((0x01, rest)) if rest.len() == OUTPUT_REPORT_LEN => {
                if let Err(e) = self.output.lock().update(rest) {
                    warn!("output update failed: {}", e);
                } else {
                    trace!("output report updated from endpoint");
                }
            }
            _ => {
                warn!("dropping unrecognized endpoint frame ({} bytes)", chunk.len());
            }
        }
    }
}

impl Default for Ds3Controller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_report_dispatch() {
        let pad = Ds3Controller::new();
        assert_eq!(pad.get_report(ReportType::Input, 0x01).unwrap().len(), 49);
        for id in [0x01u8, 0xF1, 0xF2, 0xF5, 0xEF, 0xF7, 0xF8] {
            let data = pad.get_report(ReportType::Feature, id).unwrap();
            assert_eq!(data.len(), 64, "feature 0x{:02X}", id);
        }
    }

    #[test]
    fn test_unknown_reports_rejected() {
        let pad = Ds3Controller::new();
        let err = pad.get_report(ReportType::Feature, 0xAB).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::UnsupportedReport {
                report_type: 3,
                id: 0xAB
            }
        ));
        // 0x02 and 0xEE sit in the descriptor but have no backing state
        assert!(pad.get_report(ReportType::Feature, 0x02).is_err());
        assert!(pad.get_report(ReportType::Feature, 0xEE).is_err());
        assert!(pad.set_report(ReportType::Feature, 0xF2, &[]).is_err());
        assert!(pad.set_report(ReportType::Input, 0x01, &[]).is_err());
    }

    #[test]
    fn test_set_output_report() {
        let pad = Ds3Controller::new();
        let mut payload = [0u8; 48];
        payload[1] = 0x10;
        payload[2] = 0x20;
        pad.set_report(ReportType::Output, 0x01, &payload).unwrap();
        assert_eq!(pad.read_output(), payload);

        let err = pad
            .set_report(ReportType::Output, 0x01, &payload[..40])
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidLength { .. }));
        // previous state kept
        assert_eq!(pad.read_output(), payload);
    }

    #[test]
    fn test_apply_input_requires_48_bytes() {
        let pad = Ds3Controller::new();
        assert!(pad.apply_input(&[0u8; 47]).is_err());
        assert!(pad.apply_input(&[0u8; 49]).is_err());

        let mut frame = [0u8; 48];
        frame[0] = 0x01;
        frame[2] = 0x08;
        pad.apply_input(&frame).unwrap();
        let bytes = pad.input_bytes();
        assert_eq!(&bytes[..48], &frame[..]);
        assert_eq!(bytes[48], 0x00);
    }

    #[test]
    fn test_streaming_toggles_via_set_report() {
        let pad = Ds3Controller::new();
        assert!(!pad.input_streaming_enabled());
        pad.set_report(ReportType::Feature, 0xF4, &[0x42, 0x02])
            .unwrap();
        assert!(pad.input_streaming_enabled());
        pad.set_report(ReportType::Feature, 0xF4, &[0x42, 0x0B])
            .unwrap();
        assert!(!pad.input_streaming_enabled());
    }

    #[test]
    fn test_feed_endpoint_frame() {
        let pad = Ds3Controller::new();
        let mut frame = [0u8; 49];
        frame[0] = 0x01;
        frame[10] = 0x04; // LED byte of the payload
        pad.feed_endpoint_frame(&frame);
        assert_eq!(pad.read_output()[9], 0x04);

        // wrong id or wrong length: dropped
        let before = pad.read_output();
        let mut bad = frame;
        bad[0] = 0x02;
        pad.feed_endpoint_frame(&bad);
        pad.feed_endpoint_frame(&frame[..40]);
        pad.feed_endpoint_frame(&[]);
        assert_eq!(pad.read_output(), before);
    }

    #[test]
    fn test_local_input_setters() {
        let pad = Ds3Controller::new();
        pad.set_button(Button::Start, true, None);
        assert_eq!(pad.input_bytes()[2], 0x08);
        pad.set_sticks(1, 2, 3, 4);
        assert_eq!(&pad.input_bytes()[6..10], &[1, 2, 3, 4]);
    }
}
