//! The bus uses two checksums: a CRC8 guarding the frame header (so a
//! corrupt header aborts reception immediately) and a CRC16 over the whole
//! frame. Both are plain MSB-first bit-serial algorithms with no reflection
//! and no final XOR.

/// CRC8, polynomial 0x39, initial value 0x66.
#[derive(Debug, Clone, Copy)]
pub struct Crc8 {
    state: u8,
}

impl Default for Crc8 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc8 {
    pub const INIT: u8 = 0x66;
    pub const POLY: u8 = 0x39;

    #[inline]
    pub fn new() -> Self {
        Self { state: Self::INIT }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.state = Self::INIT;
    }

    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.state ^= byte;
        for _ in 0..8 {
            if self.state & 0x80 != 0 {
                self.state = (self.state << 1) ^ Self::POLY;
            } else {
                self.state <<= 1;
            }
        }
    }

    #[inline]
    pub fn value(&self) -> u8 {
        self.state
    }
}

/// CRC16, polynomial 0x1021, initial value 0x913D.
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    state: u16,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    pub const INIT: u16 = 0x913D;
    pub const POLY: u16 = 0x1021;

    #[inline]
    pub fn new() -> Self {
        Self { state: Self::INIT }
    }

    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.state ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if self.state & 0x8000 != 0 {
                self.state = (self.state << 1) ^ Self::POLY;
            } else {
                self.state <<= 1;
            }
        }
    }

    #[inline]
    pub fn value(&self) -> u16 {
        self.state
    }
}

/// One-shot CRC8 over a byte slice.
pub fn crc8(data: &[u8]) -> u8 {
    let mut c = Crc8::new();
    for &b in data {
        c.update(b);
    }
    c.value()
}

/// One-shot CRC16 over a byte slice.
pub fn crc16(data: &[u8]) -> u16 {
    let mut c = Crc16::new();
    for &b in data {
        c.update(b);
    }
    c.value()
}
