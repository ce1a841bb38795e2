//! Emulated controller flash memory: two 256-byte banks with factory
//! contents, plus the read/write pointer driven by the 0xF1 flash commands.
//!
//! The host driver reads calibration and configuration blobs straight out of
//! these banks and rejects the controller if the bytes differ from what a
//! factory pad carries, so the contents below are reproduced bit-exact.

/// Length of one flash bank.
pub const FLASH_BANK_LEN: usize = 256;

/// Flash bank A.
///
/// Regions: controller ID header at [0x00..0x04) (firmware low byte at
/// [0x03]), configuration at [0x08..0x20), stick calibration at
/// [0x20..0x30), extended calibration at [0x30..0x60), firmware high byte
/// and stick metadata at [0x60..0x6F), deadzone/gain tables at
/// [0x70..0xA0), first half of the rumble LUT at [0xB0..0x100).
#[rustfmt::skip]
pub const FLASH_BANK_A: [u8; FLASH_BANK_LEN] = [
    // 0x00: controller ID header
    0x00, 0x01, 0x04, 0x85, 0x00, 0x00, 0x00, 0x00, 0x40, 0x09, 0x0C, 0x00, 0x08, 0x03, 0x2D, 0x33,
    // 0x10: configuration
    0x0D, 0x06, 0x00, 0x00, 0x20, 0x50, 0x01, 0x07, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00,
    // 0x20: stick calibration
    0x01, 0xED, 0x01, 0xF7, 0x01, 0xDE, 0x01, 0xF8, 0x00, 0x01, 0x01, 0x60, 0x80, 0x20, 0x15, 0x01,
    // 0x30: extended calibration
    0x02, 0x00, 0x01, 0xFE, 0x02, 0x02, 0x01, 0xFD, 0x02, 0x01, 0x01, 0xFF, 0x02, 0x00, 0x02, 0x00,
    0x01, 0xFC, 0x02, 0x04, 0x01, 0xFB, 0x02, 0x03, 0x02, 0x00, 0x01, 0xFF, 0x02, 0x01, 0x01, 0xFE,
    0x02, 0x02, 0x01, 0xFD, 0x02, 0x00, 0x02, 0x00, 0x01, 0xFF, 0x01, 0xFF, 0x02, 0x00, 0x02, 0x00,
    // 0x60: firmware high byte, stick metadata
    0x01, 0xC0, 0x02, 0xA0, 0x33, 0x02, 0x04, 0x10, 0x10, 0x0A, 0x0A, 0x04, 0x06, 0x3F, 0x3F, 0x00,
    // 0x70: deadzone/gain tables
    0x0A, 0x10, 0x0A, 0x10, 0x05, 0xE0, 0x05, 0xE0, 0x02, 0x20, 0x02, 0x20, 0x00, 0x20, 0x00, 0x20,
    0x0C, 0x00, 0x0C, 0x00, 0x07, 0x80, 0x07, 0x80, 0x01, 0x40, 0x01, 0x40, 0x00, 0x00, 0x00, 0x00,
    0x28, 0x28, 0x28, 0x28, 0x1E, 0x1E, 0x1E, 0x1E, 0x14, 0x14, 0x14, 0x14, 0x0A, 0x0A, 0x0A, 0x0A,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 0xB0: rumble LUT (continues in bank B)
    0x00, 0x02, 0x04, 0x06, 0x08, 0x0A, 0x0C, 0x0E, 0x10, 0x12, 0x14, 0x16, 0x18, 0x1A, 0x1C, 0x1E,
    0x20, 0x22, 0x24, 0x26, 0x28, 0x2A, 0x2C, 0x2E, 0x30, 0x32, 0x34, 0x36, 0x38, 0x3A, 0x3C, 0x3E,
    0x40, 0x42, 0x44, 0x46, 0x48, 0x4A, 0x4C, 0x4E, 0x50, 0x52, 0x54, 0x56, 0x58, 0x5A, 0x5C, 0x5E,
    0x60, 0x62, 0x64, 0x66, 0x68, 0x6A, 0x6C, 0x6E, 0x70, 0x72, 0x74, 0x76, 0x78, 0x7A, 0x7C, 0x7E,
    0x80, 0x82, 0x84, 0x86, 0x88, 0x8A, 0x8C, 0x8E, 0x90, 0x92, 0x94, 0x96, 0x98, 0x9A, 0x9C, 0x9E,
];

/// Flash bank B.
///
/// Regions: rumble LUT continuation at [0x00..0x70), duplicate of the bank A
/// header at [0x70..0x80), motion calibration at [0x90..0xB0), footer at
/// [0xF0..0x100).
#[rustfmt::skip]
pub const FLASH_BANK_B: [u8; FLASH_BANK_LEN] = [
    // 0x00: rumble LUT continuation
    0xA0, 0xA2, 0xA4, 0xA6, 0xA8, 0xAA, 0xAC, 0xAE, 0xB0, 0xB2, 0xB4, 0xB6, 0xB8, 0xBA, 0xBC, 0xBE,
    0xC0, 0xC2, 0xC4, 0xC6, 0xC8, 0xCA, 0xCC, 0xCE, 0xD0, 0xD2, 0xD4, 0xD6, 0xD8, 0xDA, 0xDC, 0xDE,
    0xE0, 0xE2, 0xE4, 0xE6, 0xE8, 0xEA, 0xEC, 0xEE, 0xF0, 0xF2, 0xF4, 0xF6, 0xF8, 0xFA, 0xFC, 0xFE,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    // 0x70: duplicate header
    0x00, 0x01, 0x04, 0x85, 0x00, 0x00, 0x00, 0x00, 0x40, 0x09, 0x0C, 0x00, 0x08, 0x03, 0x2D, 0x33,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 0x90: motion calibration
    0x02, 0x00, 0x02, 0x00, 0x02, 0x00, 0x01, 0xFF, 0x02, 0x01, 0x01, 0xFE, 0x02, 0x00, 0x02, 0x00,
    0x00, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x02, 0x00, 0x02, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 0xF0: footer
    0x5A, 0xA5, 0x5A, 0xA5, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x04,
];

/// Flash banks plus the current bank selector and address pointer.
#[derive(Debug, Clone)]
pub struct FlashMemory {
    banks: [[u8; FLASH_BANK_LEN]; 2],
    bank: u8,
    addr: u8,
}

impl FlashMemory {
    pub fn new() -> Self {
        Self {
            banks: [FLASH_BANK_A, FLASH_BANK_B],
            bank: 0,
            addr: 0,
        }
    }

    /// Select the bank and address for subsequent reads and writes.
    ///
    /// Only bit 0 of the selector byte is significant.
    pub fn select(&mut self, bank: u8, addr: u8) {
        self.bank = bank & 0x01;
        self.addr = addr;
    }

    /// Reset the selector and pointer to their power-on values.
    pub fn reset_pointer(&mut self) {
        self.bank = 0;
        self.addr = 0;
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Read 16 bytes at the current pointer, aligned down to a 16-byte
    /// boundary, wrapping at the end of the bank.
    pub fn read_block(&self) -> [u8; 16] {
        let base = (self.addr & 0xF0) as usize;
        let mut block = [0u8; 16];
        for (i, slot) in block.iter_mut().enumerate() {
            *slot = self.banks[self.bank as usize][(base + i) % FLASH_BANK_LEN];
        }
        block
    }

    /// Write up to 16 bytes at the current pointer, wrapping at the end of
    /// the bank.
    pub fn write(&mut self, data: &[u8]) {
        let base = self.addr as usize;
        for (i, byte) in data.iter().take(16).enumerate() {
            self.banks[self.bank as usize][(base + i) % FLASH_BANK_LEN] = *byte;
        }
    }

    pub fn bank_a(&self) -> &[u8; FLASH_BANK_LEN] {
        &self.banks[0]
    }

    pub fn bank_b(&self) -> &[u8; FLASH_BANK_LEN] {
        &self.banks[1]
    }
}

impl Default for FlashMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_layout() {
        // firmware low byte in the header, high byte at the metadata block
        assert_eq!(FLASH_BANK_A[0x03], 0x85);
        assert_eq!(FLASH_BANK_A[0x60], 0x01);
        // stick calibration block
        assert_eq!(
            &FLASH_BANK_A[0x20..0x30],
            &[
                0x01, 0xED, 0x01, 0xF7, 0x01, 0xDE, 0x01, 0xF8, 0x00, 0x01, 0x01, 0x60, 0x80,
                0x20, 0x15, 0x01
            ]
        );
        // bank B duplicates the bank A header
        assert_eq!(&FLASH_BANK_B[0x70..0x80], &FLASH_BANK_A[0x00..0x10]);
        // the rumble LUT is continuous across the bank boundary
        assert_eq!(FLASH_BANK_A[0xFF], 0x9E);
        assert_eq!(FLASH_BANK_B[0x00], 0xA0);
    }

    #[test]
    fn test_read_block_alignment() {
        let mut flash = FlashMemory::new();
        flash.select(0, 0x27);
        // reads align down to the 16-byte boundary
        assert_eq!(flash.read_block(), FLASH_BANK_A[0x20..0x30]);
    }

    #[test]
    fn test_read_block_wraps() {
        let mut flash = FlashMemory::new();
        flash.select(1, 0xF8);
        let block = flash.read_block();
        assert_eq!(block, FLASH_BANK_B[0xF0..0x100]);
    }

    #[test]
    fn test_bank_selector_masked() {
        let mut flash = FlashMemory::new();
        flash.select(0xFF, 0x00);
        assert_eq!(flash.bank(), 1);
        flash.select(0xFE, 0x00);
        assert_eq!(flash.bank(), 0);
    }

    #[test]
    fn test_write_then_read() {
        let mut flash = FlashMemory::new();
        flash.select(1, 0x40);
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        flash.write(&payload);
        assert_eq!(&flash.read_block()[..4], &payload);
        // bank A untouched
        assert_eq!(flash.bank_a()[0x40], FLASH_BANK_A[0x40]);
    }

    #[test]
    fn test_write_wraps_at_bank_end() {
        let mut flash = FlashMemory::new();
        flash.select(0, 0xFE);
        flash.write(&[0x11, 0x22, 0x33]);
        assert_eq!(flash.bank_a()[0xFE], 0x11);
        assert_eq!(flash.bank_a()[0xFF], 0x22);
        assert_eq!(flash.bank_a()[0x00], 0x33);
    }
}
