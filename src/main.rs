//! `cantus` - play or export a JSON composition.

use cantus::{
    load_composition, Composition, Destination, Error, Outcome, PlaybackConfig, Result, Session,
};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::{self, ExitCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Composition to play, as JSON.
    #[arg(required_unless_present = "list_ports")]
    composition: Option<PathBuf>,

    /// Write a Standard MIDI File instead of playing.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Playback settings (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output ports per synth.
    #[arg(long)]
    ports: Option<usize>,

    /// Pitch bend range of the synths, in semitones.
    #[arg(long)]
    bend_range: Option<f64>,

    /// Output port name pattern; repeat to play on several synths at once.
    #[arg(long = "synth")]
    synths: Vec<String>,

    /// Record messages instead of sending them, then print a summary.
    #[arg(long)]
    dry_run: bool,

    /// After playing, ask for a path to save the composition as MIDI.
    #[arg(long)]
    ask_save: bool,

    /// List output ports and exit.
    #[arg(long)]
    list_ports: bool,

    /// More logging; repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn build_session(args: &Args) -> Result<Session> {
    let config = match &args.config {
        Some(path) => PlaybackConfig::load(path)?,
        None => PlaybackConfig::default(),
    };

    let mut builder = Session::builder().config(config);
    if let Some(ports) = args.ports {
        builder = builder.port_count(ports);
    }
    if let Some(range) = args.bend_range {
        builder = builder.bend_range(range);
    }
    for synth in &args.synths {
        builder = builder.synth(synth);
    }
    if args.dry_run {
        builder = builder.capture().panic_delay(std::time::Duration::ZERO);
    }
    builder.build()
}

/// Asks for a path without suffix; an empty answer skips saving.
fn prompt_save_path() -> Result<Option<PathBuf>> {
    print!("Save as MIDI file (path without .mid, empty to skip): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim();
    Ok((!answer.is_empty()).then(|| PathBuf::from(format!("{answer}.mid"))))
}

fn run(args: Args) -> Result<()> {
    let session = build_session(&args)?;

    if args.list_ports {
        for port in session.output_ports()? {
            println!("{}: {}", port.index, port.name);
        }
        return Ok(());
    }

    let Some(path) = &args.composition else {
        return Ok(());
    };
    let composition: Composition = load_composition(path)?;

    // Once playback is over nothing can sound, so Ctrl-C at the save prompt
    // just leaves.
    let prompting = Arc::new(AtomicBool::new(false));
    let interrupt = session.interrupt();
    let at_prompt = Arc::clone(&prompting);
    ctrlc::set_handler(move || {
        if at_prompt.load(Ordering::SeqCst) {
            eprintln!();
            process::exit(0);
        }
        interrupt.trigger();
    })
    .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;

    let destination = match &args.out {
        Some(out) => Destination::File(out.clone()),
        None => Destination::Play,
    };

    match session.process(&composition, destination)? {
        Outcome::Exported { path, notes } => {
            println!("Wrote {} notes to {}", notes, path.display());
        }
        Outcome::Played(report) => {
            if args.dry_run {
                println!(
                    "{} notes, {} messages in {:.2?}",
                    report.notes, report.messages_sent, report.elapsed
                );
            }
            if session.interrupt().is_triggered() {
                return Err(cantus::midi_io::Error::Interrupted.into());
            }
            if args.ask_save {
                prompting.store(true, Ordering::SeqCst);
                let answer = prompt_save_path()?;
                prompting.store(false, Ordering::SeqCst);
                if session.interrupt().is_triggered() {
                    return Err(cantus::midi_io::Error::Interrupted.into());
                }
                if let Some(out) = answer {
                    session.process(&composition, Destination::File(out.clone()))?;
                    println!("Saved {}", out.display());
                }
            }
        }
    }

    session.close();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_interrupted() => {
            eprintln!("Interrupted, all notes off.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
