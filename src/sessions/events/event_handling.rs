use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::packets::channel_message::{ChannelMessage, wire_to_signed_bend};
use crate::packets::message_iterator::{Decoded, decode};
use crate::packets::raw_packet::RawPacket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteData {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChangeData {
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramChangeData {
    pub channel: u8,
    pub program: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchBendData {
    pub channel: u8,
    /// -8192 to 8191, 0 is centre. Data bytes with their high bit set push it up to 24575.
    pub value: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AftertouchData {
    pub channel: u8,
    pub pressure: u8,
}

pub(super) type PacketListener = dyn for<'a> Fn(&'a RawPacket) + Send + Sync + 'static;
pub(super) type MidiMessageListener = dyn Fn(ChannelMessage) + Send + Sync + 'static;
pub(super) type NoteListener = dyn Fn(NoteData) + Send + Sync + 'static;
pub(super) type ControlChangeListener = dyn Fn(ControlChangeData) + Send + Sync + 'static;
pub(super) type ProgramChangeListener = dyn Fn(ProgramChangeData) + Send + Sync + 'static;
pub(super) type PitchBendListener = dyn Fn(PitchBendData) + Send + Sync + 'static;
pub(super) type AftertouchListener = dyn Fn(AftertouchData) + Send + Sync + 'static;

type Registered<L> = Vec<(ListenerId, Arc<L>)>;

/// Handle returned by `add_listener`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpMidiEventType {
    RawMessage,
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    PitchBend,
    Aftertouch,
    UnknownMessage,
    MidiMessage,
}

/// Every listener the receiver knows about.
///
/// Cloning only bumps the reference counts of the callbacks, which is how the receive loop
/// takes a snapshot before dispatching a datagram.
#[derive(Clone)]
pub struct EventListeners {
    next_id: u64,
    raw_message: Registered<PacketListener>,
    note_on: Registered<NoteListener>,
    note_off: Registered<NoteListener>,
    control_change: Registered<ControlChangeListener>,
    program_change: Registered<ProgramChangeListener>,
    pitch_bend: Registered<PitchBendListener>,
    aftertouch: Registered<AftertouchListener>,
    unknown_message: Registered<PacketListener>,
    midi_message: Registered<MidiMessageListener>,
}

/// Every datagram as received, whether or not it parses.
pub struct RawMessageEvent;
pub struct NoteOnEvent;
/// Includes Note On messages with velocity 0.
pub struct NoteOffEvent;
pub struct ControlChangeEvent;
pub struct ProgramChangeEvent;
pub struct PitchBendEvent;
/// Channel pressure. Polyphonic key pressure is never reported.
pub struct AftertouchEvent;
/// Raised once per unrecognised or truncated status byte, carrying the whole datagram.
pub struct UnknownMessageEvent;
/// Every message that was also reported through its own event, as a [`ChannelMessage`].
pub struct MidiMessageEvent;

pub trait EventType {
    type Data<'a>;

    const KIND: IpMidiEventType;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static;
}

impl EventType for RawMessageEvent {
    type Data<'a> = &'a RawPacket;

    const KIND: IpMidiEventType = IpMidiEventType::RawMessage;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<PacketListener> = Arc::new(callback);
        listeners.raw_message.push((id, listener));
    }
}

impl EventType for NoteOnEvent {
    type Data<'a> = NoteData;

    const KIND: IpMidiEventType = IpMidiEventType::NoteOn;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<NoteListener> = Arc::new(callback);
        listeners.note_on.push((id, listener));
    }
}

impl EventType for NoteOffEvent {
    type Data<'a> = NoteData;

    const KIND: IpMidiEventType = IpMidiEventType::NoteOff;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<NoteListener> = Arc::new(callback);
        listeners.note_off.push((id, listener));
    }
}

impl EventType for ControlChangeEvent {
    type Data<'a> = ControlChangeData;

    const KIND: IpMidiEventType = IpMidiEventType::ControlChange;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<ControlChangeListener> = Arc::new(callback);
        listeners.control_change.push((id, listener));
    }
}

impl EventType for ProgramChangeEvent {
    type Data<'a> = ProgramChangeData;

    const KIND: IpMidiEventType = IpMidiEventType::ProgramChange;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<ProgramChangeListener> = Arc::new(callback);
        listeners.program_change.push((id, listener));
    }
}

impl EventType for PitchBendEvent {
    type Data<'a> = PitchBendData;

    const KIND: IpMidiEventType = IpMidiEventType::PitchBend;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<PitchBendListener> = Arc::new(callback);
        listeners.pitch_bend.push((id, listener));
    }
}

impl EventType for AftertouchEvent {
    type Data<'a> = AftertouchData;

    const KIND: IpMidiEventType = IpMidiEventType::Aftertouch;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<AftertouchListener> = Arc::new(callback);
        listeners.aftertouch.push((id, listener));
    }
}

impl EventType for UnknownMessageEvent {
    type Data<'a> = &'a RawPacket;

    const KIND: IpMidiEventType = IpMidiEventType::UnknownMessage;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<PacketListener> = Arc::new(callback);
        listeners.unknown_message.push((id, listener));
    }
}

impl EventType for MidiMessageEvent {
    type Data<'a> = ChannelMessage;

    const KIND: IpMidiEventType = IpMidiEventType::MidiMessage;

    fn add_listener_to_storage<F>(listeners: &mut EventListeners, id: ListenerId, callback: F)
    where
        F: for<'a> Fn(Self::Data<'a>) + Send + Sync + 'static,
    {
        let listener: Arc<MidiMessageListener> = Arc::new(callback);
        listeners.midi_message.push((id, listener));
    }
}

impl Default for EventListeners {
    fn default() -> Self {
        Self::new()
    }
}

fn notify_all<L: ?Sized, T: Copy>(listeners: &Registered<L>, data: T, cancel_token: &CancellationToken)
where
    L: Fn(T),
{
    for (_, listener) in listeners {
        if cancel_token.is_cancelled() {
            return;
        }
        listener(data);
    }
}

fn remove_from<L: ?Sized>(listeners: &mut Registered<L>, id: ListenerId) -> bool {
    let before = listeners.len();
    listeners.retain(|(listener_id, _)| *listener_id != id);
    listeners.len() != before
}

impl EventListeners {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            raw_message: Vec::new(),
            note_on: Vec::new(),
            note_off: Vec::new(),
            control_change: Vec::new(),
            program_change: Vec::new(),
            pitch_bend: Vec::new(),
            aftertouch: Vec::new(),
            unknown_message: Vec::new(),
            midi_message: Vec::new(),
        }
    }

    pub fn add<E, F>(&mut self, _event: E, callback: F) -> ListenerId
    where
        E: EventType,
        F: for<'a> Fn(E::Data<'a>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        E::add_listener_to_storage(self, id, callback);
        event!(Level::TRACE, kind = ?E::KIND, id = id.0, "Added listener");
        id
    }

    /// Returns `false` when no listener had this id.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        // short-circuit: an id lives in exactly one list
        remove_from(&mut self.raw_message, id)
            || remove_from(&mut self.note_on, id)
            || remove_from(&mut self.note_off, id)
            || remove_from(&mut self.control_change, id)
            || remove_from(&mut self.program_change, id)
            || remove_from(&mut self.pitch_bend, id)
            || remove_from(&mut self.aftertouch, id)
            || remove_from(&mut self.unknown_message, id)
            || remove_from(&mut self.midi_message, id)
    }

    pub fn len(&self) -> usize {
        self.raw_message.len()
            + self.note_on.len()
            + self.note_off.len()
            + self.control_change.len()
            + self.program_change.len()
            + self.pitch_bend.len()
            + self.aftertouch.len()
            + self.unknown_message.len()
            + self.midi_message.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports one decoded message to its own listeners, then to the `MidiMessageEvent` ones.
    fn notify_midi_message(&self, message: ChannelMessage, cancel_token: &CancellationToken) {
        match message {
            ChannelMessage::NoteOn { channel, note, velocity } => {
                notify_all(&self.note_on, NoteData { channel, note, velocity }, cancel_token)
            }
            ChannelMessage::NoteOff { channel, note, velocity } => {
                notify_all(&self.note_off, NoteData { channel, note, velocity }, cancel_token)
            }
            ChannelMessage::ControlChange { channel, controller, value } => {
                notify_all(&self.control_change, ControlChangeData { channel, controller, value }, cancel_token)
            }
            ChannelMessage::ProgramChange { channel, program } => {
                notify_all(&self.program_change, ProgramChangeData { channel, program }, cancel_token)
            }
            ChannelMessage::ChannelPressure { channel, pressure } => {
                notify_all(&self.aftertouch, AftertouchData { channel, pressure }, cancel_token)
            }
            ChannelMessage::PitchBend { channel, value } => notify_all(
                &self.pitch_bend,
                PitchBendData {
                    channel,
                    value: wire_to_signed_bend(value),
                },
                cancel_token,
            ),
            ChannelMessage::KeyPressure { .. } => {
                event!(Level::TRACE, "Discarding polyphonic key pressure");
                return;
            }
        }
        notify_all(&self.midi_message, message, cancel_token);
    }

    /// Runs the full notification sequence for one received datagram.
    ///
    /// `cancel_token` is checked before every listener call; once it is cancelled no further
    /// listener runs.
    pub(crate) fn dispatch(&self, packet: &RawPacket, cancel_token: &CancellationToken) {
        notify_all(&self.raw_message, packet, cancel_token);

        for decoded in decode(packet.bytes()) {
            if cancel_token.is_cancelled() {
                event!(Level::DEBUG, "Receiver stopped mid-packet, dropping the rest");
                return;
            }
            match decoded {
                Decoded::Message(message) => self.notify_midi_message(message, cancel_token),
                Decoded::Unknown { offset, status } => {
                    event!(Level::TRACE, offset, status = format!("{status:#04X}"), "Unknown MIDI status byte");
                    notify_all(&self.unknown_message, packet, cancel_token);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Raw(Vec<u8>),
        NoteOn(NoteData),
        NoteOff(NoteData),
        ControlChange(ControlChangeData),
        ProgramChange(ProgramChangeData),
        PitchBend(PitchBendData),
        Aftertouch(AftertouchData),
        Unknown(Vec<u8>),
    }

    fn recording_listeners() -> (EventListeners, Arc<Mutex<Vec<Seen>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = EventListeners::new();

        let s = seen.clone();
        listeners.add(RawMessageEvent, move |packet: &RawPacket| s.lock().unwrap().push(Seen::Raw(packet.bytes().to_vec())));
        let s = seen.clone();
        listeners.add(NoteOnEvent, move |data| s.lock().unwrap().push(Seen::NoteOn(data)));
        let s = seen.clone();
        listeners.add(NoteOffEvent, move |data| s.lock().unwrap().push(Seen::NoteOff(data)));
        let s = seen.clone();
        listeners.add(ControlChangeEvent, move |data| s.lock().unwrap().push(Seen::ControlChange(data)));
        let s = seen.clone();
        listeners.add(ProgramChangeEvent, move |data| s.lock().unwrap().push(Seen::ProgramChange(data)));
        let s = seen.clone();
        listeners.add(PitchBendEvent, move |data| s.lock().unwrap().push(Seen::PitchBend(data)));
        let s = seen.clone();
        listeners.add(AftertouchEvent, move |data| s.lock().unwrap().push(Seen::Aftertouch(data)));
        let s = seen.clone();
        listeners.add(UnknownMessageEvent, move |packet: &RawPacket| s.lock().unwrap().push(Seen::Unknown(packet.bytes().to_vec())));

        (listeners, seen)
    }

    fn dispatch(bytes: &[u8]) -> Vec<Seen> {
        let (listeners, seen) = recording_listeners();
        listeners.dispatch(&RawPacket::new(bytes.to_vec()), &CancellationToken::new());
        seen.lock().unwrap().clone()
    }

    #[test]
    fn test_velocity_zero_note_on_raises_note_off() {
        assert_eq!(
            dispatch(&[0x90, 60, 0]),
            vec![
                Seen::Raw(vec![0x90, 60, 0]),
                Seen::NoteOff(NoteData {
                    channel: 0,
                    note: 60,
                    velocity: 0
                })
            ]
        );
    }

    #[test]
    fn test_truncated_message_raises_unknown_with_whole_packet() {
        assert_eq!(dispatch(&[0xB0, 7]), vec![Seen::Raw(vec![0xB0, 7]), Seen::Unknown(vec![0xB0, 7])]);
    }

    #[test]
    fn test_unknown_carries_entire_datagram() {
        let packet = [0x90, 60, 100, 0xF8];
        assert_eq!(
            dispatch(&packet),
            vec![
                Seen::Raw(packet.to_vec()),
                Seen::NoteOn(NoteData {
                    channel: 0,
                    note: 60,
                    velocity: 100
                }),
                Seen::Unknown(packet.to_vec()),
            ]
        );
    }

    #[test]
    fn test_stray_byte_skipped() {
        assert_eq!(
            dispatch(&[0x10, 0x90, 60, 100]),
            vec![
                Seen::Raw(vec![0x10, 0x90, 60, 100]),
                Seen::NoteOn(NoteData {
                    channel: 0,
                    note: 60,
                    velocity: 100
                })
            ]
        );
    }

    #[test]
    fn test_every_kind_in_one_packet() {
        let packet = [0x81, 1, 2, 0xB2, 3, 4, 0xC3, 5, 0xD4, 6, 0xE5, 0x7F, 0x7F, 0xA6, 7, 8];
        assert_eq!(
            dispatch(&packet),
            vec![
                Seen::Raw(packet.to_vec()),
                Seen::NoteOff(NoteData {
                    channel: 1,
                    note: 1,
                    velocity: 2
                }),
                Seen::ControlChange(ControlChangeData {
                    channel: 2,
                    controller: 3,
                    value: 4
                }),
                Seen::ProgramChange(ProgramChangeData { channel: 3, program: 5 }),
                Seen::Aftertouch(AftertouchData { channel: 4, pressure: 6 }),
                Seen::PitchBend(PitchBendData { channel: 5, value: 8191 }),
            ]
        );
    }

    #[test]
    fn test_pitch_bend_minimum() {
        assert_eq!(
            dispatch(&[0xE0, 0, 0]),
            vec![Seen::Raw(vec![0xE0, 0, 0]), Seen::PitchBend(PitchBendData { channel: 0, value: -8192 })]
        );
    }

    #[test]
    fn test_raw_listener_sees_empty_and_garbage_packets() {
        assert_eq!(dispatch(&[]), vec![Seen::Raw(vec![])]);
        assert_eq!(dispatch(&[0x01, 0x02]), vec![Seen::Raw(vec![0x01, 0x02])]);
    }

    #[test]
    fn test_midi_message_event_follows_typed_event() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = EventListeners::new();
        let o = order.clone();
        listeners.add(MidiMessageEvent, move |message| o.lock().unwrap().push(format!("generic {message:?}")));
        let o = order.clone();
        listeners.add(NoteOnEvent, move |data| o.lock().unwrap().push(format!("note on {}", data.note)));

        listeners.dispatch(&RawPacket::new(vec![0x90, 60, 100, 0xA0, 60, 10]), &CancellationToken::new());

        let order = order.lock().unwrap();
        assert_eq!(order.len(), 2, "key pressure must not reach the generic listener");
        assert_eq!(order[0], "note on 60");
        assert_eq!(
            order[1],
            format!(
                "generic {:?}",
                ChannelMessage::NoteOn {
                    channel: 0,
                    note: 60,
                    velocity: 100
                }
            )
        );
    }

    #[test]
    fn test_multiple_listeners_same_event() {
        let count = Arc::new(Mutex::new(0));
        let mut listeners = EventListeners::new();
        for _ in 0..3 {
            let count = count.clone();
            listeners.add(ControlChangeEvent, move |_| *count.lock().unwrap() += 1);
        }
        listeners.dispatch(&RawPacket::new(vec![0xB0, 1, 2]), &CancellationToken::new());
        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn test_remove_listener() {
        let count = Arc::new(Mutex::new(0));
        let mut listeners = EventListeners::new();
        let c = count.clone();
        let id = listeners.add(ProgramChangeEvent, move |_| *c.lock().unwrap() += 1);
        assert_eq!(listeners.len(), 1);

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert!(listeners.is_empty());

        listeners.dispatch(&RawPacket::new(vec![0xC0, 1]), &CancellationToken::new());
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_registration() {
        let count = Arc::new(Mutex::new(0));
        let mut listeners = EventListeners::new();
        let snapshot = listeners.clone();
        let c = count.clone();
        listeners.add(NoteOnEvent, move |_| *c.lock().unwrap() += 1);

        snapshot.dispatch(&RawPacket::new(vec![0x90, 1, 1]), &CancellationToken::new());
        assert_eq!(*count.lock().unwrap(), 0);
        listeners.dispatch(&RawPacket::new(vec![0x90, 1, 1]), &CancellationToken::new());
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_high_bit_data_bytes_reported_unmasked() {
        assert_eq!(
            dispatch(&[0x90, 0x40, 0x80, 0xE0, 0xFF, 0xFF]),
            vec![
                Seen::Raw(vec![0x90, 0x40, 0x80, 0xE0, 0xFF, 0xFF]),
                Seen::NoteOn(NoteData {
                    channel: 0,
                    note: 0x40,
                    velocity: 0x80
                }),
                Seen::PitchBend(PitchBendData { channel: 0, value: 24575 }),
            ]
        );
        assert_eq!(
            dispatch(&[0xB0, 0xFF, 0xFF, 0xC0, 0x80]),
            vec![
                Seen::Raw(vec![0xB0, 0xFF, 0xFF, 0xC0, 0x80]),
                Seen::ControlChange(ControlChangeData {
                    channel: 0,
                    controller: 0xFF,
                    value: 0xFF
                }),
                Seen::ProgramChange(ProgramChangeData { channel: 0, program: 0x80 }),
            ]
        );
    }

    #[test]
    fn test_cancel_from_listener_stops_remaining_notifications() {
        let (mut listeners, seen) = recording_listeners();
        let token = CancellationToken::new();
        let t = token.clone();
        listeners.add(NoteOnEvent, move |_| t.cancel());
        let late = Arc::new(Mutex::new(0));
        let l = late.clone();
        listeners.add(NoteOnEvent, move |_| *l.lock().unwrap() += 1);

        listeners.dispatch(&RawPacket::new(vec![0x90, 60, 100, 0xB0, 7, 100]), &token);

        // the recorder registered before the cancelling listener still sees the note on,
        // the listener after it and the control change are never reported
        assert_eq!(*late.lock().unwrap(), 0);
        assert_eq!(
            seen.lock().unwrap().clone(),
            vec![
                Seen::Raw(vec![0x90, 60, 100, 0xB0, 7, 100]),
                Seen::NoteOn(NoteData {
                    channel: 0,
                    note: 60,
                    velocity: 100
                }),
            ]
        );
    }

    #[test]
    fn test_cancelled_token_suppresses_dispatch() {
        let (listeners, seen) = recording_listeners();
        let token = CancellationToken::new();
        token.cancel();
        listeners.dispatch(&RawPacket::new(vec![0x90, 60, 100]), &token);
        assert!(seen.lock().unwrap().is_empty());
    }
}
