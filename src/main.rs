use anyhow::Context;
use horen::app::PlayerApp;
use horen::audio::{AudioBackend, NullBackend, RodioBackend};
use horen::bridge::{InboundEvent, LogBridge};
use horen::data::JsonDataCenter;
use horen::library;
use horen::model::OrderPolicy;
use horen::session::{PlaybackSession, SessionState};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const LOOP_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Default)]
struct CliArgs {
    data_dir: Option<PathBuf>,
    random: bool,
    no_audio: bool,
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("horen=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1).collect())?;

    let backend: Box<dyn AudioBackend> = if args.no_audio {
        Box::new(NullBackend::new())
    } else {
        match RodioBackend::new() {
            Ok(backend) => Box::new(backend),
            Err(err) => {
                tracing::warn!("no audio output, continuing silently: {err:#}");
                Box::new(NullBackend::new())
            }
        }
    };

    let data = match &args.data_dir {
        Some(dir) => JsonDataCenter::open(dir)?,
        None => JsonDataCenter::open_default()?,
    };

    let mut session = PlaybackSession::new(backend);
    if args.random {
        session.set_policy(OrderPolicy::Random);
    }

    let mut app = PlayerApp::new(session, data, LogBridge::default());
    app.startup()?;

    if args.files.is_empty() {
        if let Err(err) = app.resume() {
            tracing::warn!("could not resume saved playlist: {err}");
        }
    } else {
        let tracks = library::read_tracks(&args.files).context("failed to open files")?;
        app.handle_inbound(InboundEvent::FilesOpened(tracks));
    }

    if app.session().state() == SessionState::Idle {
        anyhow::bail!("nothing to play; pass audio files or save a playlist first");
    }

    loop {
        app.run_once(Instant::now())?;
        if app.session().state() == SessionState::Idle {
            break;
        }
        thread::sleep(LOOP_INTERVAL);
    }

    app.close()
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--random" => out.random = true,
            "--no-audio" => out.no_audio = true,
            "--data-dir" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--data-dir requires a directory");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--data-dir cannot be empty");
                }
                out.data_dir = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with("--") => anyhow::bail!("unknown argument {other}"),
            file => out.files.push(PathBuf::from(file)),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("horen [options] [files...]");
    println!("  --random          Pick the next track at random");
    println!("  --no-audio        Use the silent backend");
    println!("  --data-dir DIR    Settings, cache and playlists directory");
    println!("Without files, the saved default playlist is resumed.");
}
