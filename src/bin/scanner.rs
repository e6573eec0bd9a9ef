// ABOUTME: One-shot bus scanner: opens a stream, frames traffic for a fixed
// ABOUTME: duration, and prints every frame it sees -- a discovery aid, not a daemon

use std::error::Error;
use std::time::Duration;

use argh::FromArgs;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use finitude::bus::Bus;
use finitude::stream;

/// Listen on a bus connection and print every frame observed until the
/// duration elapses. Does not inject any traffic.
#[derive(FromArgs)]
struct CliArgs {
    /// stream URI, e.g. `/dev/ttyUSB0`, `telnet://gateway:23`, `localfile://capture.bin`
    #[argh(option, short = 'w')]
    where_: String,

    /// how long to listen, in seconds (default: 10)
    #[argh(option, short = 's')]
    seconds: Option<u64>,

    /// enable debug-level logging
    #[argh(switch, short = 'd')]
    debugging: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let seconds = cli_args.seconds.unwrap_or(10);
    println!("scanning {} for {seconds}s", cli_args.where_);

    let stream = stream::open(&cli_args.where_).await?;
    let mut bus = Bus::new(stream, false);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            frame = bus.read_frame() => {
                match frame {
                    Ok(frame) => println!("{frame}"),
                    Err(e) => {
                        eprintln!("read error: {e}");
                        break;
                    }
                }
            }
        }
    }

    println!("done, {} resynchronizations", bus.desync_count());
    Ok(())
}
