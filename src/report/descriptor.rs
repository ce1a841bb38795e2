//! HID report descriptor for the emulated pad.

/// DualShock 3 HID report descriptor.
///
/// Report layout as seen by the host:
/// - ID 1: 48-byte input (buttons, sticks, pressures, motion), 48-byte
///   output (rumble/LED), 48-byte feature
/// - IDs 2, 0xEE, 0xEF: 48-byte feature slots
pub const DS3_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x04, // Usage (Joystick)
    0xA1, 0x01, // Collection (Application)
    0xA1, 0x02, //   Collection (Logical)
    0x85, 0x01, //     Report ID (1)
    // Reserved byte
    0x75, 0x08, //     Report Size (8)
    0x95, 0x01, //     Report Count (1)
    0x15, 0x00, //     Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x81, 0x03, //     Input (Constant, Variable, Absolute)
    // 19 button bits
    0x75, 0x01, //     Report Size (1)
    0x95, 0x13, //     Report Count (19)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x35, 0x00, //     Physical Minimum (0)
    0x45, 0x01, //     Physical Maximum (1)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x13, //     Usage Maximum (19)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    // 13 bits of padding
    0x75, 0x01, //     Report Size (1)
    0x95, 0x0D, //     Report Count (13)
    0x06, 0x00, 0xFF, // Usage Page (Vendor Defined)
    0x81, 0x03, //     Input (Constant, Variable, Absolute)
    // Stick axes
    0x15, 0x00, //     Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x01, //     Usage (Pointer)
    0xA1, 0x00, //     Collection (Physical)
    0x75, 0x08, //       Report Size (8)
    0x95, 0x04, //       Report Count (4)
    0x35, 0x00, //       Physical Minimum (0)
    0x46, 0xFF, 0x00, //   Physical Maximum (255)
    0x09, 0x30, //       Usage (X)
    0x09, 0x31, //       Usage (Y)
    0x09, 0x32, //       Usage (Z)
    0x09, 0x35, //       Usage (Rz)
    0x81, 0x02, //       Input (Data, Variable, Absolute)
    0xC0, //     End Collection
    // Pressures, motion, and the rest of the input report
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x27, //     Report Count (39)
    0x09, 0x01, //     Usage (Pointer)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    // Output report (rumble/LED)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x30, //     Report Count (48)
    0x09, 0x01, //     Usage (Pointer)
    0x91, 0x02, //     Output (Data, Variable, Absolute)
    // Feature report
    0x75, 0x08, //     Report Size (8)
    0x95, 0x30, //     Report Count (48)
    0x09, 0x01, //     Usage (Pointer)
    0xB1, 0x02, //     Feature (Data, Variable, Absolute)
    0xC0, //   End Collection
    0xA1, 0x02, //   Collection (Logical)
    0x85, 0x02, //     Report ID (2)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x30, //     Report Count (48)
    0x09, 0x01, //     Usage (Pointer)
    0xB1, 0x02, //     Feature (Data, Variable, Absolute)
    0xC0, //   End Collection
    0xA1, 0x02, //   Collection (Logical)
    0x85, 0xEE, //     Report ID (238)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x30, //     Report Count (48)
    0x09, 0x01, //     Usage (Pointer)
    0xB1, 0x02, //     Feature (Data, Variable, Absolute)
    0xC0, //   End Collection
    0xA1, 0x02, //   Collection (Logical)
    0x85, 0xEF, //     Report ID (239)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x30, //     Report Count (48)
    0x09, 0x01, //     Usage (Pointer)
    0xB1, 0x02, //     Feature (Data, Variable, Absolute)
    0xC0, //   End Collection
    0xC0, // End Collection
];
