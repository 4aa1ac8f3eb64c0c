#[cfg(feature = "examples")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::time::Duration;

    use ipmidi::sessions::config::MulticastConfig;
    use ipmidi::sessions::sender::Sender;
    use tracing::{Level, event};
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

    let sender = Sender::bind(MulticastConfig::default()).await?;
    event!(Level::INFO, target = %sender.target(), "Playing a C major scale");

    sender.send_program_change(0, 0).await?;
    for note in [60u8, 62, 64, 65, 67, 69, 71, 72] {
        sender.send_note_on(0, note, 100).await?;
        tokio::time::sleep(Duration::from_millis(250)).await;
        sender.send_note_off_default(0, note).await?;
    }

    for value in (-8192i16..=8191).step_by(512) {
        sender.send_pitch_bend(0, value).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    sender.send_pitch_bend(0, 0).await?;

    sender.close();
    Ok(())
}

#[cfg(not(feature = "examples"))]
fn main() {
    println!("This example requires the 'examples' feature to be enabled.");
}
