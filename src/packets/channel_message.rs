//! Construction and wire encoding of MIDI channel-voice messages.
//!
//! [`ChannelMessage`] keeps every field as the plain integer that travels on the wire. The
//! constructors validate their arguments, so a value built here always encodes to a status byte
//! followed by 7-bit data bytes. Values produced by the decoder carry the data bytes as they
//! arrived, high bit included.
use bytes::{BufMut, Bytes, BytesMut};
use midi_types::{MidiMessage, status};

use super::util::{CHANNEL_MASK, DATA_MASK};
use crate::error::{IpMidiError, Result};

pub const CHANNEL_MAX: u8 = 15;
pub const DATA_MAX: u8 = 127;
pub const PITCH_BEND_MIN: i16 = -8192;
pub const PITCH_BEND_MAX: i16 = 8191;

const PITCH_BEND_CENTER: i32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMessage {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Polyphonic aftertouch.
    KeyPressure { channel: u8, note: u8, pressure: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    /// Channel aftertouch.
    ChannelPressure { channel: u8, pressure: u8 },
    /// `value` is the unsigned wire value `lsb | msb << 7`, 8192 being centre.
    PitchBend { channel: u8, value: u16 },
}

impl ChannelMessage {
    pub fn channel(&self) -> u8 {
        match *self {
            ChannelMessage::NoteOff { channel, .. }
            | ChannelMessage::NoteOn { channel, .. }
            | ChannelMessage::KeyPressure { channel, .. }
            | ChannelMessage::ControlChange { channel, .. }
            | ChannelMessage::ProgramChange { channel, .. }
            | ChannelMessage::ChannelPressure { channel, .. }
            | ChannelMessage::PitchBend { channel, .. } => channel,
        }
    }

    pub fn status(&self) -> u8 {
        let kind = match self {
            ChannelMessage::NoteOff { .. } => status::NOTE_OFF,
            ChannelMessage::NoteOn { .. } => status::NOTE_ON,
            ChannelMessage::KeyPressure { .. } => status::KEY_PRESSURE,
            ChannelMessage::ControlChange { .. } => status::CONTROL_CHANGE,
            ChannelMessage::ProgramChange { .. } => status::PROGRAM_CHANGE,
            ChannelMessage::ChannelPressure { .. } => status::CHANNEL_PRESSURE,
            ChannelMessage::PitchBend { .. } => status::PITCH_BEND_CHANGE,
        };
        kind | (self.channel() & CHANNEL_MASK)
    }
}

impl TryFrom<&MidiMessage> for ChannelMessage {
    type Error = IpMidiError;

    fn try_from(message: &MidiMessage) -> Result<Self> {
        let converted = match *message {
            MidiMessage::NoteOff(channel, note, velocity) => ChannelMessage::NoteOff {
                channel: channel.into(),
                note: note.into(),
                velocity: velocity.into(),
            },
            MidiMessage::NoteOn(channel, note, velocity) => ChannelMessage::NoteOn {
                channel: channel.into(),
                note: note.into(),
                velocity: velocity.into(),
            },
            MidiMessage::KeyPressure(channel, note, pressure) => ChannelMessage::KeyPressure {
                channel: channel.into(),
                note: note.into(),
                pressure: pressure.into(),
            },
            MidiMessage::ControlChange(channel, controller, value) => ChannelMessage::ControlChange {
                channel: channel.into(),
                controller: controller.into(),
                value: value.into(),
            },
            MidiMessage::ProgramChange(channel, program) => ChannelMessage::ProgramChange {
                channel: channel.into(),
                program: program.into(),
            },
            MidiMessage::ChannelPressure(channel, pressure) => ChannelMessage::ChannelPressure {
                channel: channel.into(),
                pressure: pressure.into(),
            },
            MidiMessage::PitchBendChange(channel, value) => ChannelMessage::PitchBend {
                channel: channel.into(),
                value: value.into(),
            },
            _ => {
                return Err(IpMidiError::InvalidArgument {
                    parameter: "message",
                    reason: "only channel-voice messages can be sent over ipMIDI",
                });
            }
        };
        Ok(converted)
    }
}

fn check_range(parameter: &'static str, value: i32, min: i32, max: i32) -> Result<()> {
    if value < min || value > max {
        return Err(IpMidiError::OutOfRange { parameter, min, max, value });
    }
    Ok(())
}

fn check_channel(channel: u8) -> Result<u8> {
    check_range("channel", channel.into(), 0, CHANNEL_MAX.into())?;
    Ok(channel)
}

fn check_data(parameter: &'static str, value: u8) -> Result<u8> {
    check_range(parameter, value.into(), 0, DATA_MAX.into())?;
    Ok(value)
}

pub fn note_on(channel: u8, note: u8, velocity: u8) -> Result<ChannelMessage> {
    Ok(ChannelMessage::NoteOn {
        channel: check_channel(channel)?,
        note: check_data("note", note)?,
        velocity: check_data("velocity", velocity)?,
    })
}

pub fn note_off(channel: u8, note: u8, velocity: u8) -> Result<ChannelMessage> {
    Ok(ChannelMessage::NoteOff {
        channel: check_channel(channel)?,
        note: check_data("note", note)?,
        velocity: check_data("velocity", velocity)?,
    })
}

pub fn key_pressure(channel: u8, note: u8, pressure: u8) -> Result<ChannelMessage> {
    Ok(ChannelMessage::KeyPressure {
        channel: check_channel(channel)?,
        note: check_data("note", note)?,
        pressure: check_data("pressure", pressure)?,
    })
}

pub fn control_change(channel: u8, controller: u8, value: u8) -> Result<ChannelMessage> {
    Ok(ChannelMessage::ControlChange {
        channel: check_channel(channel)?,
        controller: check_data("controller", controller)?,
        value: check_data("value", value)?,
    })
}

pub fn program_change(channel: u8, program: u8) -> Result<ChannelMessage> {
    Ok(ChannelMessage::ProgramChange {
        channel: check_channel(channel)?,
        program: check_data("program", program)?,
    })
}

pub fn aftertouch(channel: u8, pressure: u8) -> Result<ChannelMessage> {
    Ok(ChannelMessage::ChannelPressure {
        channel: check_channel(channel)?,
        pressure: check_data("pressure", pressure)?,
    })
}

/// `value` is the signed bend, -8192 (full down) to 8191 (full up), 0 being centre.
pub fn pitch_bend(channel: u8, value: i16) -> Result<ChannelMessage> {
    let channel = check_channel(channel)?;
    check_range("value", value.into(), PITCH_BEND_MIN.into(), PITCH_BEND_MAX.into())?;
    Ok(ChannelMessage::PitchBend {
        channel,
        value: signed_to_wire_bend(value),
    })
}

pub(crate) fn signed_to_wire_bend(value: i16) -> u16 {
    (i32::from(value) + PITCH_BEND_CENTER) as u16
}

/// The largest raw value two unmasked data bytes can form is `0x7FFF`, so this never overflows.
pub(crate) fn wire_to_signed_bend(raw: u16) -> i16 {
    (i32::from(raw) - PITCH_BEND_CENTER) as i16
}

pub(crate) trait WriteExt {
    fn write(&self, bytes: &mut BytesMut);
}

impl WriteExt for ChannelMessage {
    fn write(&self, bytes: &mut BytesMut) {
        bytes.put_u8(self.status());

        match *self {
            ChannelMessage::NoteOn { note, velocity, .. } | ChannelMessage::NoteOff { note, velocity, .. } => {
                bytes.put_u8(note & DATA_MASK);
                bytes.put_u8(velocity & DATA_MASK);
            }
            ChannelMessage::KeyPressure { note, pressure, .. } => {
                bytes.put_u8(note & DATA_MASK);
                bytes.put_u8(pressure & DATA_MASK);
            }
            ChannelMessage::ControlChange { controller, value, .. } => {
                bytes.put_u8(controller & DATA_MASK);
                bytes.put_u8(value & DATA_MASK);
            }
            ChannelMessage::ProgramChange { program, .. } => {
                bytes.put_u8(program & DATA_MASK);
            }
            ChannelMessage::ChannelPressure { pressure, .. } => {
                bytes.put_u8(pressure & DATA_MASK);
            }
            ChannelMessage::PitchBend { value, .. } => {
                bytes.put_u8((value & u16::from(DATA_MASK)) as u8);
                bytes.put_u8(((value >> 7) & u16::from(DATA_MASK)) as u8);
            }
        }
    }
}

/// Encodes one message into the bytes of a single datagram.
pub fn encode(message: &ChannelMessage) -> Bytes {
    encode_batch(std::slice::from_ref(message))
}

/// Packs `messages` back to back, each with its own status byte.
pub fn encode_batch(messages: &[ChannelMessage]) -> Bytes {
    let mut bytes = BytesMut::with_capacity(messages.len() * 3);
    for message in messages {
        message.write(&mut bytes);
    }
    bytes.freeze()
}
