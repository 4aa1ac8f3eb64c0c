#[cfg(feature = "examples")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use ipmidi::packets::raw_packet::RawPacket;
    use ipmidi::sessions::events::event_handling::{
        ControlChangeEvent, NoteOffEvent, NoteOnEvent, PitchBendEvent, ProgramChangeEvent, UnknownMessageEvent,
    };
    use ipmidi::sessions::receiver::Receiver;
    use tracing::{Level, event};
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

    // 225.0.0.37:21928
    let receiver = Receiver::default();

    receiver
        .add_listener(NoteOnEvent, |e| {
            event!(Level::INFO, "Note On  | Ch {} | Note {} | Vel {}", e.channel, e.note, e.velocity);
        })
        .await;
    receiver
        .add_listener(NoteOffEvent, |e| {
            event!(Level::INFO, "Note Off | Ch {} | Note {}", e.channel, e.note);
        })
        .await;
    receiver
        .add_listener(ControlChangeEvent, |e| {
            event!(Level::INFO, "CC       | Ch {} | CC {} = {}", e.channel, e.controller, e.value);
        })
        .await;
    receiver
        .add_listener(ProgramChangeEvent, |e| {
            event!(Level::INFO, "Program  | Ch {} | Program {}", e.channel, e.program);
        })
        .await;
    receiver
        .add_listener(PitchBendEvent, |e| {
            event!(Level::INFO, "Pitch    | Ch {} | Value {}", e.channel, e.value);
        })
        .await;
    receiver
        .add_listener(UnknownMessageEvent, |packet: &RawPacket| {
            event!(Level::WARN, "Unknown  | {:02X?}", packet.bytes());
        })
        .await;

    receiver.start().await?;

    tokio::signal::ctrl_c().await?;
    event!(Level::INFO, "Stopping ipMIDI receiver");
    receiver.stop();
    Ok(())
}

#[cfg(not(feature = "examples"))]
fn main() {
    println!("This example requires the 'examples' feature to be enabled.");
}
