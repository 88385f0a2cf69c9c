use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use clap::Parser;
use log::Level;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Copy, Clone)]
pub struct ConfigPaths<'a> {
    pub base_path: &'a str,
}

pub const DEFAULT_CONFIGURATION_PATHS: ConfigPaths<'static> = ConfigPaths {
    base_path: "./.splinter.toml",
};

#[derive(Parser, Debug, Default)]
#[command(name = "splinter")]
#[command(about = "Fractures a cube, then one of its pieces, on a fixed rate tick loop")]
#[command(version)]
pub struct Args {
    /// Configuration file, instead of ./.splinter.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// One of error, warn, info, debug, trace
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Ticks per second
    #[arg(long)]
    pub frame_rate: Option<u32>,

    /// Pieces per split
    #[arg(short, long)]
    pub pieces: Option<u32>,

    /// Times every piece is split again
    #[arg(short, long)]
    pub iterations: Option<u32>,

    /// How many times pieces of pieces may fracture. Negative is unlimited
    #[arg(short, long, allow_hyphen_values = true)]
    pub generations: Option<i32>,

    /// Cluster cuts around the impact within this fraction of the mesh size
    #[arg(short, long)]
    pub radius: Option<f32>,

    /// Decompose on the calling thread
    #[arg(long)]
    pub sync: bool,

    /// Stop after this many ticks
    #[arg(long)]
    pub max_frames: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse {path:?}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub frame_rate: u32,
    pub pieces: u32,
    pub iterations: u32,
    pub generations: i32,
    pub radius: f32,
    pub asynchronous: bool,
    pub max_frames: u32,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frame_rate: 120,
            pieces: 5,
            iterations: 1,
            generations: 2,
            radius: 0.,
            asynchronous: true,
            max_frames: 600,
            source: None,
        }
    }
}

impl Config {
    /// Reads the file named by the flags (or the default path) and lays the flags over it.
    ///
    /// A missing default file means defaults; a missing file the flags asked for is an error.
    pub fn load(paths: ConfigPaths, args: &Args) -> Result<Config, ConfigError> {
        let mut c = match args.config.as_deref() {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(paths.base_path);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Config::default()
                }
            }
        };
        c.apply(args);
        c.level()?;
        Ok(c)
    }

    fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut c: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        c.source = Some(path.to_path_buf());
        Ok(c)
    }

    fn apply(&mut self, args: &Args) {
        if let Some(l) = &args.log_level {
            self.log_level = l.clone();
        }
        if let Some(r) = args.frame_rate {
            self.frame_rate = r;
        }
        if let Some(p) = args.pieces {
            self.pieces = p;
        }
        if let Some(i) = args.iterations {
            self.iterations = i;
        }
        if let Some(g) = args.generations {
            self.generations = g;
        }
        if let Some(r) = args.radius {
            self.radius = r;
        }
        if args.sync {
            self.asynchronous = false;
        }
        if let Some(m) = args.max_frames {
            self.max_frames = m;
        }
    }

    pub fn level(&self) -> Result<Level, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }
}
