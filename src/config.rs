use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

// Simulation tunables. The defaults are hand-tuned for look and feel.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Hard population ceiling; spawns at capacity are dropped.
    pub max_stars: usize,
    pub initial_stars: usize,
    // A random star is spawned every `15 / star_generation_rate` ticks.
    pub star_generation_rate: f32,
    pub stimulus_spawn_chance: f32,
    pub ambient_spawn_chance: f32,
    pub population_floor_ratio: f32,
    pub population_floor_chance: f32,
    pub acceleration_radius: f32,
    pub constellation_seed_radius: f32,
    pub constellation_edge_radius: f32,
    pub max_depth: u32,
    pub stimulus_radius: f32,
    pub bright_star_chance: f32,
    pub stimulus_bright_chance: f32,
    pub drag_spawn_chance: f32,
    pub stats_refresh_chance: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_stars: 500,
            initial_stars: 150,
            star_generation_rate: 3.0,
            stimulus_spawn_chance: 0.5,
            ambient_spawn_chance: 0.15,
            population_floor_ratio: 0.6,
            population_floor_chance: 0.4,
            acceleration_radius: 180.0,
            constellation_seed_radius: 150.0,
            constellation_edge_radius: 140.0,
            max_depth: 15,
            stimulus_radius: 100.0,
            bright_star_chance: 0.05,
            stimulus_bright_chance: 0.1,
            drag_spawn_chance: 0.7,
            stats_refresh_chance: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub config: Config,
    pub bg_color: Option<(u8, u8, u8)>,
    // World units per terminal pixel.
    pub scale: f32,
    pub seed: Option<u64>,
    pub nebula: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: Config::default(),
            bg_color: None,
            scale: 8.0,
            seed: None,
            nebula: true,
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Options),
    Help,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),
    #[error("invalid hex color: {0} (expected format RRGGBB, e.g. 1a1b26)")]
    InvalidColor(String),
    #[error("invalid value for {option}: {value}")]
    InvalidNumber { option: String, value: String },
    #[error("{option} must be {expected}")]
    OutOfRange { option: String, expected: &'static str },
    #[error("unknown option: {0}")]
    UnknownOption(String),
}

pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}

fn parse_number<T: FromStr>(option: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        option: option.to_string(),
        value: value.to_string(),
    })
}

pub fn parse_args<I>(args: I) -> Result<Command, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |option: &str| args.next().ok_or_else(|| ConfigError::MissingValue(option.to_string()));

        match arg.as_str() {
            "--bg-color" => {
                let hex = value("--bg-color")?;
                options.bg_color = Some(parse_hex_color(&hex).ok_or(ConfigError::InvalidColor(hex))?);
            }
            "--scale" => {
                let scale: f32 = parse_number("--scale", &value("--scale")?)?;
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(ConfigError::OutOfRange {
                        option: "--scale".to_string(),
                        expected: "a positive number",
                    });
                }
                options.scale = scale;
            }
            "--max-stars" => {
                let max_stars: usize = parse_number("--max-stars", &value("--max-stars")?)?;
                if max_stars == 0 {
                    return Err(ConfigError::OutOfRange {
                        option: "--max-stars".to_string(),
                        expected: "at least 1",
                    });
                }
                options.config.max_stars = max_stars;
            }
            "--initial-stars" => {
                options.config.initial_stars = parse_number("--initial-stars", &value("--initial-stars")?)?;
            }
            "--seed" => {
                options.seed = Some(parse_number("--seed", &value("--seed")?)?);
            }
            "--no-nebula" => options.nebula = false,
            "--log-file" => {
                options.log_file = Some(PathBuf::from(value("--log-file")?));
            }
            "help" | "--help" | "-h" => return Ok(Command::Help),
            _ => return Err(ConfigError::UnknownOption(arg.clone())),
        }
    }

    Ok(Command::Run(options))
}
