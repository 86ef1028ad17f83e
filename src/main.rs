//! Lane Runner entry point
//!
//! Runs a headless session on a virtual 60 Hz clock: a simple autopilot steers, the
//! audio engine records tones instead of playing them, and the scene binding
//! mirrors the pools into an in-memory backend.
//!
//! Usage: `lane-runner [tuning.json]`. `LANE_RUNNER_SEED` fixes the seed,
//! `LANE_RUNNER_VOLUME` overrides the master volume, `RUST_LOG` controls logging.

use lane_runner::audio::{AudioEngine, BackgroundMusic, MusicSheet, RecordingSynth};
use lane_runner::consts::TICKS_PER_SECOND;
use lane_runner::lane_x;
use lane_runner::scene::{HeadlessScene, SceneBinding};
use lane_runner::sim::{Game, GameEvent, TickInput, tick};
use lane_runner::{Result, Settings, Tuning};

/// Longest session the demo plays before stopping (seconds)
const SESSION_SECONDS: f64 = 120.0;
/// How far ahead the autopilot looks for obstacles
const LOOKAHEAD: f32 = 12.0;

fn main() {
    env_logger::init();
    log::info!("Lane Runner (headless) starting...");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let tuning = match std::env::args().nth(1) {
        Some(path) => Tuning::load(path)?,
        None => Tuning::default(),
    };
    let seed = std::env::var("LANE_RUNNER_SEED")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0x5EED);
    let mut settings = Settings::load_or_default("settings.json");
    if let Some(volume) = std::env::var("LANE_RUNNER_VOLUME")
        .ok()
        .and_then(|s| s.parse::<f32>().ok())
    {
        settings.set_master_volume(volume);
    }
    log::info!("Seed {seed}, music source {}", settings.music_source.as_str());

    let base_tempo = tuning.base_tempo;
    let mut game = Game::new(tuning, seed, 0.0);
    let speed = game.speed_signal();
    let mut scene = HeadlessScene::new();
    let binding = SceneBinding::new(&mut scene, &game);

    let mut music = BackgroundMusic::select(&settings, MusicSheet::builtin(), base_tempo);
    let mut engine = AudioEngine::new(RecordingSynth::new(), settings);
    log::info!("Background music: {}", music.kind());

    // The first input unlocks audio and re-arms the safety window
    engine.unlock(0.0);
    game.mark_run_started(0.0);
    music.play(0.0);

    let dt = 1.0 / TICKS_PER_SECOND;
    let mut now = 0.0;
    while now < SESSION_SECONDS {
        now += dt;
        engine.synth_mut().set_time(now);

        let input = autopilot(&game);
        tick(&mut game, &input, now);

        let events = game.drain_events();
        engine.handle_events(&events);
        engine.poll(now);
        music.update(now, speed.read(), &mut engine);
        binding.sync(&mut scene, &game);

        if events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })) {
            music.pause();
            break;
        }
    }

    log::info!(
        "Session over after {now:.1}s: score {}, distance {:.0}, speed x{:.2}",
        game.score(),
        game.run.distance,
        game.speed_ratio(),
    );
    log::info!(
        "Audio: {} tones scheduled, {} dropped",
        engine.synth().tones.len(),
        engine.dropped()
    );
    Ok(())
}

/// Dodge into a free neighbouring lane, or jump when boxed in
fn autopilot(game: &Game) -> TickInput {
    let lane = game.run.lane;
    if !lane_blocked(game, lane) {
        return TickInput::default();
    }
    if lane > 0 && !lane_blocked(game, lane - 1) {
        return TickInput {
            move_left: true,
            ..Default::default()
        };
    }
    if lane + 1 < lane_runner::consts::LANES.len() && !lane_blocked(game, lane + 1) {
        return TickInput {
            move_right: true,
            ..Default::default()
        };
    }
    TickInput {
        jump: true,
        ..Default::default()
    }
}

fn lane_blocked(game: &Game, lane: usize) -> bool {
    let x = lane_x(lane);
    let z = game.player.position.z;
    game.pools.obstacles.iter_active().any(|(_, obstacle)| {
        let bounds = obstacle.aabb();
        let ahead = obstacle.position.z < z + 1.0 && obstacle.position.z > z - LOOKAHEAD;
        ahead && bounds.min.x <= x && bounds.max.x >= x
    })
}
