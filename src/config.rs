use std::env;
use std::path::PathBuf;

use crate::forest::ForestConfig;

pub const DEFAULT_DATA_PATH: &str = "ipl.csv";
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub artifact_dir: PathBuf,
    pub test_fraction: f64,
    pub forest: ForestConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            artifact_dir: PathBuf::from("."),
            test_fraction: DEFAULT_TEST_FRACTION,
            forest: ForestConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Defaults overlaid with `IPL_*` environment overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(path) = env_path("IPL_DATA_PATH") {
            cfg.data_path = path;
        }
        cfg.artifact_dir = artifact_dir();
        if let Some(n) = env_parse::<usize>("IPL_N_ESTIMATORS") {
            cfg.forest.n_estimators = n.max(1);
        }
        if let Some(seed) = env_parse::<u64>("IPL_SEED") {
            cfg.forest.seed = seed;
        }
        if let Some(depth) = env_parse::<usize>("IPL_MAX_DEPTH") {
            cfg.forest.max_depth = (depth > 0).then_some(depth);
        }
        cfg
    }

    /// Applies `--data`, `--out`, `--trees` and `--seed` from the process arguments.
    pub fn apply_args(&mut self, args: &[String]) {
        if let Some(path) = flag_value(args, "--data") {
            self.data_path = PathBuf::from(path);
        }
        if let Some(path) = flag_value(args, "--out") {
            self.artifact_dir = PathBuf::from(path);
        }
        if let Some(n) = parsed_flag::<usize>(args, "--trees") {
            self.forest.n_estimators = n.max(1);
        }
        if let Some(seed) = parsed_flag::<u64>(args, "--seed") {
            self.forest.seed = seed;
        }
    }
}

/// Directory holding the four artifact files; the working directory unless overridden.
pub fn artifact_dir() -> PathBuf {
    env_path("IPL_ARTIFACT_DIR").unwrap_or_else(|| PathBuf::from("."))
}

/// Loads `.env.local` then `.env`, ignoring missing files.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    parse_or_warn(key, &raw)
}

fn parsed_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let raw = flag_value(args, flag)?;
    parse_or_warn(flag, &raw)
}

/// Unparseable values keep the default, with a warning rather than silence.
fn parse_or_warn<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() {
        eprintln!("[WARN] ignoring {name}={raw}: not a valid number, keeping default");
    }
    parsed
}

/// Accepts both `--flag=value` and `--flag value`.
pub fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
