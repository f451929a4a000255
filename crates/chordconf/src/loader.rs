//! Config file discovery, loading, and environment variable overlay.

use crate::{ChordConfig, ConfigError};
use std::env;
use std::path::{Path, PathBuf};

const SYSTEM_FILE: &str = "/etc/chordmood/config.toml";
const USER_FILE: &str = "chordmood/config.toml";
const LOCAL_FILE: &str = "chordmood.toml";

/// Which files and variables contributed to a loaded config.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// In load order.
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

/// Existing config files in load order: system, user, local.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Like [`discover_config_files`], with `override_path` standing in for the
/// local file when it exists.
pub fn discover_config_files_with_override(override_path: Option<&Path>) -> Vec<PathBuf> {
    let user = directories::BaseDirs::new().map(|d| d.config_dir().join(USER_FILE));
    let local = match override_path {
        Some(path) if path.exists() => path.to_path_buf(),
        _ => PathBuf::from(LOCAL_FILE),
    };

    [Some(PathBuf::from(SYSTEM_FILE)), user, Some(local)]
        .into_iter()
        .flatten()
        .filter(|path| path.exists())
        .collect()
}

/// Load a TOML file on top of `base`. Keys absent from the file keep
/// their value from `base`.
pub fn load_from_file(path: &Path, base: ChordConfig) -> Result<ChordConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path, base)
}

fn parse_error(path: &Path, message: impl Into<String>) -> ConfigError {
    ConfigError::Parse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn float(value: &toml::Value) -> Option<f64> {
    value.as_float().or_else(|| value.as_integer().map(|i| i as f64))
}

/// Overlay a TOML document onto `base`.
pub(crate) fn parse_toml(
    contents: &str,
    path: &Path,
    base: ChordConfig,
) -> Result<ChordConfig, ConfigError> {
    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_error(path, e.to_string()))?;

    let mut config = base;

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("dataset_dir").and_then(|v| v.as_str()) {
            config.paths.dataset_dir = expand_path(v);
        }
        if let Some(v) = paths.get("model_dir").and_then(|v| v.as_str()) {
            config.paths.model_dir = expand_path(v);
        }
    }

    if let Some(quantizer) = table.get("quantizer").and_then(|v| v.as_table()) {
        if let Some(v) = quantizer.get("bucket_width").and_then(float) {
            if v <= 0.0 {
                let message = format!("quantizer.bucket_width must be positive, got {v}");
                return Err(parse_error(path, message));
            }
            config.quantizer.bucket_width = v;
        }
        if let Some(v) = quantizer.get("min_velocity").and_then(|v| v.as_integer()) {
            config.quantizer.min_velocity = u8::try_from(v)
                .ok()
                .filter(|v| *v <= 127)
                .ok_or_else(|| {
                    parse_error(path, format!("quantizer.min_velocity out of range: {v}"))
                })?;
        }
        if let Some(v) = quantizer.get("min_duration").and_then(float) {
            config.quantizer.min_duration = v;
        }
    }

    if let Some(chords) = table.get("chords").and_then(|v| v.as_table()) {
        if let Some(v) = chords.get("min_distinct_pitches").and_then(|v| v.as_integer()) {
            config.chords.min_distinct_pitches = usize::try_from(v).map_err(|_| {
                parse_error(path, format!("chords.min_distinct_pitches out of range: {v}"))
            })?;
        }
    }

    if let Some(training) = table.get("training").and_then(|v| v.as_table()) {
        if let Some(v) = training.get("seed").and_then(|v| v.as_integer()) {
            config.training.seed = v as u64;
        }
        if let Some(v) = training.get("test_ratio").and_then(float) {
            if !test_ratio_in_range(v) {
                let message = format!("training.test_ratio must be in (0, 1), got {v}");
                return Err(parse_error(path, message));
            }
            config.training.test_ratio = v;
        }
        if let Some(v) = training.get("variant").and_then(|v| v.as_str()) {
            config.training.variant = v.to_string();
        }
        if let Some(list) = training.get("emotions").and_then(|v| v.as_array()) {
            config.training.emotions = list
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_lowercase())
                .collect();
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    Ok(config)
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ChordConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply `CHORDMOOD_*` style overrides from an arbitrary variable list.
///
/// Values that do not parse are ignored.
pub fn apply_overrides_from(
    config: &mut ChordConfig,
    sources: &mut ConfigSources,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    for (key, value) in vars {
        let applied = match key.as_str() {
            "CHORDMOOD_DATASET_DIR" => {
                config.paths.dataset_dir = expand_path(&value);
                true
            }
            "CHORDMOOD_MODEL_DIR" => {
                config.paths.model_dir = expand_path(&value);
                true
            }
            "CHORDMOOD_BUCKET_WIDTH" => set_parsed(&mut config.quantizer.bucket_width, &value),
            "CHORDMOOD_MIN_VELOCITY" => set_parsed(&mut config.quantizer.min_velocity, &value),
            "CHORDMOOD_MIN_DURATION" => set_parsed(&mut config.quantizer.min_duration, &value),
            "CHORDMOOD_MIN_DISTINCT_PITCHES" => {
                set_parsed(&mut config.chords.min_distinct_pitches, &value)
            }
            "CHORDMOOD_SEED" => set_parsed(&mut config.training.seed, &value),
            "CHORDMOOD_TEST_RATIO" => match value.trim().parse() {
                Ok(v) if test_ratio_in_range(v) => {
                    config.training.test_ratio = v;
                    true
                }
                _ => false,
            },
            "CHORDMOOD_VARIANT" => {
                config.training.variant = value;
                true
            }
            "CHORDMOOD_LOG_LEVEL" | "RUST_LOG" => {
                config.telemetry.log_level = value;
                true
            }
            _ => false,
        };
        if applied {
            sources.env_overrides.push(key);
        }
    }
}

/// Both splits must end up non-empty.
fn test_ratio_in_range(v: f64) -> bool {
    v > 0.0 && v < 1.0
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

/// Expand a leading `~/` or `$VAR` in a path. Unresolvable prefixes are
/// left as written.
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = if let Some(rest) = path.strip_prefix("~/") {
        directories::BaseDirs::new().map(|d| d.home_dir().join(rest))
    } else if let Some(var) = path.strip_prefix('$') {
        match var.split_once('/') {
            Some((name, rest)) => env::var(name).ok().map(|value| PathBuf::from(value).join(rest)),
            None => env::var(var).ok().map(PathBuf::from),
        }
    } else {
        None
    };
    expanded.unwrap_or_else(|| PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn expand_path_from_variable() {
        if let Ok(home) = env::var("HOME") {
            assert_eq!(expand_path("$HOME/models"), PathBuf::from(home).join("models"));
        }
        assert_eq!(
            expand_path("$CHORDMOOD_SURELY_UNSET/x"),
            PathBuf::from("$CHORDMOOD_SURELY_UNSET/x")
        );
    }

    #[test]
    fn explicit_override_replaces_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mine.toml");
        std::fs::write(&path, "").unwrap();
        let files = discover_config_files_with_override(Some(&path));
        assert_eq!(files.last(), Some(&path));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[paths]
model_dir = "/custom/models"
"#;
        let config = parse_toml(toml, Path::new("test.toml"), ChordConfig::default()).unwrap();
        assert_eq!(config.paths.model_dir, PathBuf::from("/custom/models"));
        assert_eq!(config.quantizer.bucket_width, 0.2);
        assert_eq!(config.training.seed, 42);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[paths]
dataset_dir = "/data/sets"
model_dir = "/data/models"

[quantizer]
bucket_width = 0.25
min_velocity = 40
min_duration = 0.07

[chords]
min_distinct_pitches = 3

[training]
seed = 7
test_ratio = 0.2
variant = "balanced_chunked"
emotions = ["Happy", "sad"]

[telemetry]
log_level = "debug"
"#;
        let config = parse_toml(toml, Path::new("test.toml"), ChordConfig::default()).unwrap();

        assert_eq!(config.paths.dataset_dir, PathBuf::from("/data/sets"));
        assert_eq!(config.quantizer.bucket_width, 0.25);
        assert_eq!(config.quantizer.min_velocity, 40);
        assert_eq!(config.quantizer.min_duration, 0.07);
        assert_eq!(config.chords.min_distinct_pitches, 3);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.test_ratio, 0.2);
        assert_eq!(config.training.variant, "balanced_chunked");
        assert_eq!(config.training.emotions, vec!["happy", "sad"]);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn integer_bucket_width_is_accepted() {
        let toml = "[quantizer]\nbucket_width = 1\n";
        let config = parse_toml(toml, Path::new("t.toml"), ChordConfig::default()).unwrap();
        assert_eq!(config.quantizer.bucket_width, 1.0);
    }

    #[test]
    fn invalid_values_are_parse_errors() {
        for toml in [
            "[quantizer]\nbucket_width = 0.0\n",
            "[quantizer]\nmin_velocity = 300\n",
            "[training]\ntest_ratio = 1.5\n",
            "[training]\ntest_ratio = 0.0\n",
            "[training]\ntest_ratio = 1.0\n",
            "not = [valid",
        ] {
            let err = parse_toml(toml, Path::new("bad.toml"), ChordConfig::default()).unwrap_err();
            assert!(matches!(err, ConfigError::Parse { .. }), "{toml}");
        }
    }

    #[test]
    fn later_file_can_restore_a_default() {
        let first =
            parse_toml("[training]\nseed = 9\n", Path::new("a.toml"), ChordConfig::default())
                .unwrap();
        let second = parse_toml("[training]\nseed = 42\n", Path::new("b.toml"), first).unwrap();
        assert_eq!(second.training.seed, 42);
    }

    #[test]
    fn env_overrides_apply_and_are_recorded() {
        let mut config = ChordConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[
                ("CHORDMOOD_SEED", "11"),
                ("CHORDMOOD_VARIANT", "full"),
                ("CHORDMOOD_BUCKET_WIDTH", "wide"),
                ("UNRELATED", "x"),
            ]),
        );
        assert_eq!(config.training.seed, 11);
        assert_eq!(config.training.variant, "full");
        assert_eq!(config.quantizer.bucket_width, 0.2);
        assert_eq!(sources.env_overrides, vec!["CHORDMOOD_SEED", "CHORDMOOD_VARIANT"]);
    }

    #[test]
    fn env_test_ratio_outside_unit_interval_is_ignored() {
        let default = ChordConfig::default().training.test_ratio;
        for bad in ["0", "0.0", "1", "-0.3"] {
            let mut config = ChordConfig::default();
            let mut sources = ConfigSources::default();
            apply_overrides_from(&mut config, &mut sources, vars(&[("CHORDMOOD_TEST_RATIO", bad)]));
            assert_eq!(config.training.test_ratio, default, "{bad}");
            assert!(sources.env_overrides.is_empty());
        }

        let mut config = ChordConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, vars(&[("CHORDMOOD_TEST_RATIO", "0.25")]));
        assert_eq!(config.training.test_ratio, 0.25);
    }
}
