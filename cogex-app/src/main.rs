mod app;
mod output;
mod trial_file;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use cogex_audio::KiraAudio;
use cogex_core::{AudioLoader, CaptureKind, FrameAction, TrialState};
use cogex_experiment::{NoAudio, Trial, TrialContext, reveal_questions, run_blocking};
use cogex_input::{KeyFeed, KeyboardSource, MidiSource};
use output::{Caption, JsonReport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use trial_file::{TrialFile, describe_layout};

#[derive(Parser, Debug)]
#[command(name = "cogex", about = "Run one audio-anchored trial and report it as JSON")]
struct Args {
    /// Trial description (JSON).
    #[arg(long)]
    trial: PathBuf,

    /// Write the report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// No window: start immediately and drive the trial on this thread.
    #[arg(long)]
    headless: bool,

    /// Seed for the layout shuffle.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let file = TrialFile::load(&args.trial)?;
    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    let timeline = file.timeline(&mut StdRng::seed_from_u64(seed));

    let audio = match KiraAudio::new() {
        Ok(audio) => Some(audio),
        Err(err) => {
            log::warn!("running without audio: {err:#}");
            None
        }
    };

    let caption = Caption::default();
    let mut ctx = TrialContext::new(caption.clone(), JsonReport::new(args.out.clone()));
    let mut keys: Option<KeyFeed> = None;
    match file.config.capture {
        Some(CaptureKind::Keyboard) => {
            let (source, feed) = KeyboardSource::new();
            ctx = ctx.with_input(source);
            keys = Some(feed);
        }
        Some(CaptureKind::Midi) => ctx = ctx.with_input(MidiSource::new("cogex")),
        None => {}
    }
    let wants_click = file.config.metronome.as_ref().and_then(|m| m.plan()).is_some();
    if let (true, Some(audio)) = (wants_click, &audio) {
        match audio.click_track() {
            Ok(click) => ctx = ctx.with_ticks(click),
            Err(err) => log::warn!("metronome will be silent: {err}"),
        }
    }

    let mut trial = Trial::configure(file.config.clone(), timeline.events, ctx)
        .with_questions(reveal_questions(&file.questions));
    trial.annotate("seed", seed.to_string());
    if !timeline.layout.is_empty() {
        trial.annotate("layout", describe_layout(&timeline.layout));
    }
    if let Some(metronome) = &file.config.metronome {
        trial.annotate("metronome_condition", format!("{:?}", metronome.condition).to_lowercase());
    }

    let state = match audio {
        Some(mut audio) => prepare(&mut trial, &mut audio)?,
        None => prepare(&mut trial, &mut NoAudio)?,
    };

    if args.headless {
        if keys.is_some() {
            log::warn!("keyboard capture has no window to listen to in headless mode");
        }
        if state == TrialState::Armed {
            trial.signal_start()?;
        }
        run_blocking(&mut trial)?;
        return Ok(());
    }

    let answers_questions = !file.questions.is_empty();
    App::new(trial, keys, caption, answers_questions).run()
}

fn prepare<L: AudioLoader>(trial: &mut Trial<FrameAction>, loader: &mut L) -> Result<TrialState> {
    pollster::block_on(trial.prepare(loader)).context("trial could not be prepared")
}
