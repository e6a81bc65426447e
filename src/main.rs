use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use std::env;
use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

mod config;
mod effects;
mod render;
mod sky;

use config::{Command, Options};
use effects::constellations::ConstellationEffect;
use effects::Effect;

static BG_COLOR: OnceLock<(u8, u8, u8)> = OnceLock::new();

pub fn get_bg_color() -> (u8, u8, u8) {
    *BG_COLOR.get().unwrap_or(&(0, 0, 0))
}

fn print_usage() {
    eprintln!("constellations - Interactive starfield screensaver");
    eprintln!();
    eprintln!("Stars are born, twinkle and die. Move the mouse to stir up new stars,");
    eprintln!("drag to scatter them, and click near a star to draw a constellation.");
    eprintln!();
    eprintln!("Usage: constellations [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --bg-color RRGGBB  Set background color as hex (e.g., --bg-color 1a1b26)");
    eprintln!("  --scale N          World units per terminal pixel (default 8)");
    eprintln!("  --max-stars N      Population ceiling (default 500)");
    eprintln!("  --initial-stars N  Stars present at startup (default 150)");
    eprintln!("  --seed N           Seed the random generator for reproducible runs");
    eprintln!("  --no-nebula        Disable the drifting nebula backdrop");
    eprintln!("  --log-file PATH    Write logs to PATH (level from RUST_LOG, default warn)");
    eprintln!();
    eprintln!("Press 'q', ESC, or Ctrl+C to exit");
}

fn init_logging(options: &Options) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(path) = &options.log_file {
        let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn frame_loop<E: Effect, W: Write>(out: &mut W, effect: &mut E) -> std::io::Result<()> {
    let mut last_frame = Instant::now();
    let mut accumulator = 0.0f32;
    const FIXED_DT: f32 = 1.0 / 60.0;

    loop {
        if event::poll(Duration::from_millis(1))? {
            let event = event::read()?;
            match &event {
                Event::Key(key_event) => {
                    if key_event.code == KeyCode::Char('q')
                        || key_event.code == KeyCode::Esc
                        || (key_event.code == KeyCode::Char('c')
                            && key_event.modifiers.contains(event::KeyModifiers::CONTROL))
                    {
                        return Ok(());
                    }
                    effect.handle_event(&event);
                }
                Event::Resize(cols, rows) => {
                    effect.resize(*cols as usize, *rows as usize * 2);
                    execute!(out, Clear(ClearType::All))?;
                }
                _ => effect.handle_event(&event),
            }
        }

        let now = Instant::now();
        let frame_time = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        accumulator += frame_time;
        if accumulator > FIXED_DT * 3.0 {
            accumulator = FIXED_DT * 3.0;
        }

        while accumulator >= FIXED_DT {
            effect.update(FIXED_DT);
            accumulator -= FIXED_DT;
        }

        effect.render(out)?;
    }
}

fn run(options: &Options) -> Result<()> {
    let mut stdout = BufWriter::with_capacity(1024 * 64, stdout());

    terminal::enable_raw_mode().context("enabling raw mode")?;
    execute!(
        stdout,
        EnterAlternateScreen,
        Hide,
        Clear(ClearType::All),
        EnableMouseCapture,
        EnableFocusChange
    )
    .context("entering alternate screen")?;

    let result = terminal::size()
        .context("querying terminal size")
        .and_then(|(cols, rows)| {
            info!("starting on a {cols}x{rows} terminal");
            let mut effect = ConstellationEffect::new(cols as usize, rows as usize * 2, options);
            frame_loop(&mut stdout, &mut effect).context("running frame loop")
        });

    // Restore the terminal whatever happened above
    if let Err(err) = execute!(stdout, Show, LeaveAlternateScreen, DisableMouseCapture, DisableFocusChange) {
        warn!("failed to leave alternate screen: {err}");
    }
    terminal::disable_raw_mode().context("disabling raw mode")?;

    info!("shutting down");
    result
}

fn main() -> Result<()> {
    let options = match config::parse_args(env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            print_usage();
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    init_logging(&options)?;

    if let Some(color) = options.bg_color {
        let _ = BG_COLOR.set(color);
    }

    run(&options)
}
