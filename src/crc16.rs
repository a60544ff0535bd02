/// CRC-16/CCITT as computed by the WD179x floppy controller

/// CRC after the three 0xA1 sync bytes, used to seed the ID field CRC
pub const ID_CRC_SEED: u16 = 0xCDB4;

/// CRC after the sync bytes and the 0xFB data mark, used to seed the data CRC
pub const DATA_CRC_SEED: u16 = 0xE295;

const POLY: u16 = 0x1021;

/// Running CRC-16 (polynomial 0x1021, MSB first, no reflection)
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    /// Start a CRC from `seed`
    pub fn new(seed: u16) -> Self {
        Self { value: seed }
    }

    /// Feed bytes into the CRC
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.value ^= (byte as u16) << 8;
            for _ in 0..8 {
                self.value = if self.value & 0x8000 != 0 {
                    (self.value << 1) ^ POLY
                } else {
                    self.value << 1
                };
            }
        }
    }

    /// Current CRC value
    pub fn value(&self) -> u16 {
        self.value
    }
}

/// Compute the CRC of `data` starting from `seed`
pub fn crc16(seed: u16, data: &[u8]) -> u16 {
    let mut crc = Crc16::new(seed);
    crc.update(data);
    crc.value()
}
