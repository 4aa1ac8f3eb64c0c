pub(crate) const DATA_MASK: u8 = 0x7F;
pub(crate) const CHANNEL_MASK: u8 = 0x0F;
pub(crate) const KIND_MASK: u8 = 0xF0;

pub(crate) trait StatusBit {
    fn status_bit(&self) -> bool;
    fn kind(&self) -> u8;
    fn channel(&self) -> u8;
}

impl StatusBit for u8 {
    fn status_bit(&self) -> bool {
        self & 0x80 != 0
    }

    fn kind(&self) -> u8 {
        self & KIND_MASK
    }

    fn channel(&self) -> u8 {
        self & CHANNEL_MASK
    }
}
