//! DualShock 3 report codecs.
//!
//! Pure value logic: the input-report builder, the output-report parser, the
//! feature-report constructors and state machines, and the emulated flash
//! memory they read from. Nothing here touches sockets or endpoint files.

pub mod button;
pub mod descriptor;
pub mod feature;
pub mod flash;
pub mod input;
pub mod output;

pub use button::Button;
pub use descriptor::DS3_REPORT_DESCRIPTOR;
pub use feature::{FeatureState, FEATURE_REPORT_LEN};
pub use flash::{FlashMemory, FLASH_BANK_LEN};
pub use input::{InputReport, INPUT_FRAME_LEN, INPUT_REPORT_LEN};
pub use output::{OutputReport, OUTPUT_REPORT_LEN};

/// HID report type, as carried in the high byte of `wValue` on
/// `GET_REPORT`/`SET_REPORT` control transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Input,
    Output,
    Feature,
}

impl ReportType {
    /// Parse the wire value (1, 2, 3).
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(ReportType::Input),
            2 => Some(ReportType::Output),
            3 => Some(ReportType::Feature),
            _ => None,
        }
    }

    /// The wire value for error reporting.
    pub fn as_wire(self) -> u8 {
        match self {
            ReportType::Input => 1,
            ReportType::Output => 2,
            ReportType::Feature => 3,
        }
    }
}
