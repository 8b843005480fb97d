//! Event intake: commands staged by the control thread for the next render.
//!
//! Hand-off is a bounded single-producer/single-consumer ring (`rtrb`). The control
//! thread pushes, the audio thread drains everything at the start of each render call.
//! Neither side blocks; pushing into a full ring fails and hands the command back.

use crate::node::ParamAddress;

/// Whether a note starts or stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    NoteOn,
    NoteOff,
}

/// A MIDI-style note event. Velocity is nominally in `[0, 1]` and forwarded as given.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub kind: NoteKind,
    pub note: i32,
    pub velocity: f32,
}

impl NoteEvent {
    pub const fn on(note: i32, velocity: f32) -> Self {
        Self {
            kind: NoteKind::NoteOn,
            note,
            velocity,
        }
    }

    pub const fn off(note: i32, velocity: f32) -> Self {
        Self {
            kind: NoteKind::NoteOff,
            note,
            velocity,
        }
    }
}

/// A staged control change, applied in arrival order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Param { address: ParamAddress, value: f32 },
    Note(NoteEvent),
}

/// Create a command channel with room for `capacity` commands.
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity.max(1));
    (CommandSender { producer }, CommandReceiver { consumer })
}

/// Control-thread side of the channel.
pub struct CommandSender {
    producer: rtrb::Producer<Command>,
}

impl CommandSender {
    /// Stage a command. Returns the command if the ring is full.
    pub fn send(&mut self, command: Command) -> Result<(), Command> {
        self.producer.push(command).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }
}

/// Audio-thread side of the channel.
pub struct CommandReceiver {
    consumer: rtrb::Consumer<Command>,
}

impl CommandReceiver {
    /// Pop every staged command in arrival order. Returns how many were applied.
    pub fn drain(&mut self, mut apply: impl FnMut(Command)) -> usize {
        let mut count = 0;
        while let Ok(command) = self.consumer.pop() {
            apply(command);
            count += 1;
        }
        count
    }
}
