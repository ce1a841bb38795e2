//! FunctionFS wire structures: descriptor/strings blobs written to `ep0` and
//! the event records read back from it.

use crate::report::DS3_REPORT_DESCRIPTOR;

const DESCRIPTORS_MAGIC_V2: u32 = 3;
const STRINGS_MAGIC: u32 = 2;

const HAS_FS_DESC: u32 = 1;
const HAS_HS_DESC: u32 = 2;

const USB_DT_INTERFACE: u8 = 0x04;
const USB_DT_ENDPOINT: u8 = 0x05;
const USB_DT_HID: u8 = 0x21;
const USB_DT_HID_REPORT: u8 = 0x22;

const USB_CLASS_HID: u8 = 0x03;
const USB_ENDPOINT_XFER_INT: u8 = 0x03;

/// Logical IN endpoint address (becomes the `ep1` file).
pub const EP_ADDR_IN: u8 = 0x81;
/// Logical OUT endpoint address (becomes the `ep2` file).
pub const EP_ADDR_OUT: u8 = 0x02;

const EP_MAX_PACKET: u16 = 64;
const EP_INTERVAL_FS: u8 = 10; // milliseconds
const EP_INTERVAL_HS: u8 = 7; // 2^(7-1) microframes = 8 ms

const LANG_EN_US: u16 = 0x0409;

/// HID class request: GET_REPORT
pub const HID_REQ_GET_REPORT: u8 = 0x01;
/// HID class request: SET_REPORT
pub const HID_REQ_SET_REPORT: u8 = 0x09;
/// Standard request: GET_DESCRIPTOR
pub const USB_REQ_GET_DESCRIPTOR: u8 = 0x06;
/// Descriptor type requested for the HID report descriptor
pub const HID_DT_REPORT: u8 = USB_DT_HID_REPORT;

/// Direction bit of `bmRequestType`.
pub const USB_DIR_IN: u8 = 0x80;
/// Type bits of `bmRequestType`.
pub const USB_TYPE_MASK: u8 = 0x60;
/// Standard request type.
pub const USB_TYPE_STANDARD: u8 = 0x00;
/// Class request type.
pub const USB_TYPE_CLASS: u8 = 0x20;

/// The setup packet of a control transfer handed to user space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupRequest {
    pub fn is_device_to_host(&self) -> bool {
        self.request_type & USB_DIR_IN != 0
    }
}

/// One event record read from `ep0` (12 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfsEvent {
    Bind,
    Unbind,
    Enable,
    Disable,
    Setup(SetupRequest),
    Suspend,
    Resume,
}

/// Size of one event record.
pub const EVENT_SIZE: usize = 12;

impl FfsEvent {
    /// Parse a raw event record; unknown types yield `None`.
    pub fn parse(raw: &[u8; EVENT_SIZE]) -> Option<Self> {
        match raw[8] {
            0 => Some(FfsEvent::Bind),
            1 => Some(FfsEvent::Unbind),
            2 => Some(FfsEvent::Enable),
            3 => Some(FfsEvent::Disable),
            4 => Some(FfsEvent::Setup(SetupRequest {
                request_type: raw[0],
                request: raw[1],
                value: u16::from_le_bytes([raw[2], raw[3]]),
                index: u16::from_le_bytes([raw[4], raw[5]]),
                length: u16::from_le_bytes([raw[6], raw[7]]),
            })),
            5 => Some(FfsEvent::Suspend),
            6 => Some(FfsEvent::Resume),
            _ => None,
        }
    }
}

/// Build the descriptor blob for `ep0`: one HID interface with interrupt IN
/// and OUT endpoints, identical at full and high speed.
pub fn descriptors_blob() -> Vec<u8> {
    let fs_set = descriptor_set(EP_INTERVAL_FS);
    let hs_set = descriptor_set(EP_INTERVAL_HS);
    let total = 12 + 8 + fs_set.len() + hs_set.len();

    let mut blob = Vec::with_capacity(total);
    blob.extend_from_slice(&DESCRIPTORS_MAGIC_V2.to_le_bytes());
    blob.extend_from_slice(&(total as u32).to_le_bytes());
    blob.extend_from_slice(&(HAS_FS_DESC | HAS_HS_DESC).to_le_bytes());
    blob.extend_from_slice(&4u32.to_le_bytes()); // fs descriptor count
    blob.extend_from_slice(&4u32.to_le_bytes()); // hs descriptor count
    blob.extend_from_slice(&fs_set);
    blob.extend_from_slice(&hs_set);
    blob
}

fn descriptor_set(interval: u8) -> Vec<u8> {
    let report_len = DS3_REPORT_DESCRIPTOR.len() as u16;
    let mut set = Vec::with_capacity(32);

    // interface descriptor
    set.extend_from_slice(&[
        9,
        USB_DT_INTERFACE,
        0, // bInterfaceNumber
        0, // bAlternateSetting
        2, // bNumEndpoints
        USB_CLASS_HID,
        0, // bInterfaceSubClass: none
        0, // bInterfaceProtocol: none
        1, // iInterface
    ]);

    // HID class descriptor
    set.extend_from_slice(&[
        9,
        USB_DT_HID,
        0x11,
        0x01, // bcdHID 1.11
        0,    // bCountryCode
        1,    // bNumDescriptors
        USB_DT_HID_REPORT,
        (report_len & 0xFF) as u8,
        (report_len >> 8) as u8,
    ]);

    // interrupt IN endpoint
    set.extend_from_slice(&[
        7,
        USB_DT_ENDPOINT,
        EP_ADDR_IN,
        USB_ENDPOINT_XFER_INT,
        (EP_MAX_PACKET & 0xFF) as u8,
        (EP_MAX_PACKET >> 8) as u8,
        interval,
    ]);

    // interrupt OUT endpoint
    set.extend_from_slice(&[
        7,
        USB_DT_ENDPOINT,
        EP_ADDR_OUT,
        USB_ENDPOINT_XFER_INT,
        (EP_MAX_PACKET & 0xFF) as u8,
        (EP_MAX_PACKET >> 8) as u8,
        interval,
    ]);

    set
}

/// Build the strings blob for `ep0` (one English interface string).
pub fn strings_blob(interface_name: &str) -> Vec<u8> {
    let total = 16 + 2 + interface_name.len() + 1;

    let mut blob = Vec::with_capacity(total);
    blob.extend_from_slice(&STRINGS_MAGIC.to_le_bytes());
    blob.extend_from_slice(&(total as u32).to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes()); // str_count
    blob.extend_from_slice(&1u32.to_le_bytes()); // lang_count
    blob.extend_from_slice(&LANG_EN_US.to_le_bytes());
    blob.extend_from_slice(interface_name.as_bytes());
    blob.push(0);
    blob
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_blob_header() {
        let blob = descriptors_blob();
        assert_eq!(&blob[0..4], &3u32.to_le_bytes());
        let length = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]);
        assert_eq!(length as usize, blob.len());
        let flags = u32::from_le_bytes([blob[8], blob[9], blob[10], blob[11]]);
        assert_eq!(flags, HAS_FS_DESC | HAS_HS_DESC);
        // fs and hs descriptor sets differ only in the poll intervals
        let set_len = (blob.len() - 20) / 2;
        assert_eq!(set_len, 32);
        let (fs, hs) = blob[20..].split_at(set_len);
        assert_eq!(&fs[..24], &hs[..24]);
        assert_eq!(fs[24], EP_INTERVAL_FS);
        assert_eq!(hs[24], EP_INTERVAL_HS);
        assert_eq!(fs[31], EP_INTERVAL_FS);
        assert_eq!(hs[31], EP_INTERVAL_HS);
    }

    #[test]
    fn test_descriptor_set_references_report_descriptor() {
        let blob = descriptors_blob();
        let hid_desc = &blob[20 + 9..20 + 18];
        assert_eq!(hid_desc[1], USB_DT_HID);
        let report_len = u16::from_le_bytes([hid_desc[7], hid_desc[8]]);
        assert_eq!(report_len as usize, DS3_REPORT_DESCRIPTOR.len());
    }

    #[test]
    fn test_strings_blob() {
        let blob = strings_blob("pad");
        let length = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]);
        assert_eq!(length as usize, blob.len());
        assert_eq!(&blob[0..4], &2u32.to_le_bytes());
        assert_eq!(blob[blob.len() - 1], 0);
        assert_eq!(&blob[18..21], b"pad");
    }

    #[test]
    fn test_event_parse() {
        let mut raw = [0u8; EVENT_SIZE];
        raw[8] = 2;
        assert_eq!(FfsEvent::parse(&raw), Some(FfsEvent::Enable));

        raw[8] = 4;
        raw[0] = 0xA1; // device-to-host, class, interface
        raw[1] = HID_REQ_GET_REPORT;
        raw[2] = 0xF2; // report id
        raw[3] = 0x03; // feature
        raw[6] = 64;
        let event = FfsEvent::parse(&raw);
        match event {
            Some(FfsEvent::Setup(setup)) => {
                assert!(setup.is_device_to_host());
                assert_eq!(setup.request, HID_REQ_GET_REPORT);
                assert_eq!(setup.value, 0x03F2);
                assert_eq!(setup.length, 64);
            }
            other => panic!("unexpected event {:?}", other),
        }

        raw[8] = 9;
        assert_eq!(FfsEvent::parse(&raw), None);
    }
}
