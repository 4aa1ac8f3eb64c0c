use midi_types::status;

use super::channel_message::ChannelMessage;
use super::util::StatusBit;

/// One step of the decode scan over an ipMIDI payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Message(ChannelMessage),
    /// A status byte that is either not a channel-voice status or lacks its data bytes.
    /// The scan resumes at the byte right after it.
    Unknown { offset: usize, status: u8 },
}

/// Walks a datagram left to right, yielding every message it can recognise.
///
/// Bytes without the status bit are skipped silently; running status is not supported.
/// Data bytes following a status byte are taken as they are, even when their high bit is set.
#[derive(Debug)]
pub struct MessageIterator<'a> {
    data: &'a [u8],
    offset: usize,
}

pub fn decode(data: &[u8]) -> MessageIterator<'_> {
    MessageIterator::new(data)
}

impl<'a> MessageIterator<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        MessageIterator { data, offset: 0 }
    }

    fn data_bytes(&self, count: usize) -> Option<&'a [u8]> {
        let start = self.offset + 1;
        self.data.get(start..start + count)
    }

    fn read(&self, status_byte: u8) -> Option<(ChannelMessage, usize)> {
        let channel = status_byte.channel();
        match status_byte.kind() {
            status::NOTE_OFF => {
                let &[note, velocity] = self.data_bytes(2)? else { return None };
                Some((ChannelMessage::NoteOff { channel, note, velocity }, 3))
            }
            status::NOTE_ON => {
                let &[note, velocity] = self.data_bytes(2)? else { return None };
                let message = if velocity == 0 {
                    ChannelMessage::NoteOff { channel, note, velocity }
                } else {
                    ChannelMessage::NoteOn { channel, note, velocity }
                };
                Some((message, 3))
            }
            status::KEY_PRESSURE => {
                let &[note, pressure] = self.data_bytes(2)? else { return None };
                Some((ChannelMessage::KeyPressure { channel, note, pressure }, 3))
            }
            status::CONTROL_CHANGE => {
                let &[controller, value] = self.data_bytes(2)? else { return None };
                Some((ChannelMessage::ControlChange { channel, controller, value }, 3))
            }
            status::PROGRAM_CHANGE => {
                let &[program] = self.data_bytes(1)? else { return None };
                Some((ChannelMessage::ProgramChange { channel, program }, 2))
            }
            status::CHANNEL_PRESSURE => {
                let &[pressure] = self.data_bytes(1)? else { return None };
                Some((ChannelMessage::ChannelPressure { channel, pressure }, 2))
            }
            status::PITCH_BEND_CHANGE => {
                let &[lsb, msb] = self.data_bytes(2)? else { return None };
                let value = u16::from(lsb) | (u16::from(msb) << 7);
                Some((ChannelMessage::PitchBend { channel, value }, 3))
            }
            _ => None,
        }
    }
}

impl Iterator for MessageIterator<'_> {
    type Item = Decoded;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&status_byte) = self.data.get(self.offset) {
            if !status_byte.status_bit() {
                self.offset += 1;
                continue;
            }

            return match self.read(status_byte) {
                Some((message, width)) => {
                    self.offset += width;
                    Some(Decoded::Message(message))
                }
                None => {
                    let offset = self.offset;
                    self.offset += 1;
                    Some(Decoded::Unknown { offset, status: status_byte })
                }
            };
        }
        None
    }
}
