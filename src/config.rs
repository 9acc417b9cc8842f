use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainerConfig {
    #[serde(default)]
    pub threshold: ThresholdConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub git: GitConfig,
}

/// [threshold] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Changed lines that trigger a prompt
    #[serde(default = "default_lines")]
    pub lines: u64,
    /// Lines added past the current total on "increase" or "cancel"
    #[serde(default = "default_increment")]
    pub increment: u64,
    /// Quiet period after a cancel
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

/// [watch] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Glob patterns (relative to the repo root) whose changes never trigger a check
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

/// [git] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_lines() -> u64 {
    400
}

fn default_increment() -> u64 {
    100
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_ignore() -> Vec<String> {
    vec!["target/**".into(), "node_modules/**".into()]
}

fn default_remote() -> String {
    "origin".into()
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            lines: default_lines(),
            increment: default_increment(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore: default_ignore(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
        }
    }
}

/// One-run overrides from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub threshold: Option<u64>,
    pub increment: Option<u64>,
    pub cooldown_secs: Option<u64>,
}

impl ChainerConfig {
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(lines) = overrides.threshold {
            self.threshold.lines = lines;
        }
        if let Some(increment) = overrides.increment {
            self.threshold.increment = increment;
        }
        if let Some(secs) = overrides.cooldown_secs {
            self.threshold.cooldown_secs = secs;
        }
        self
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chainer").join("config.toml"))
}

/// Load config by merging global defaults with per-repo overrides.
/// Priority: per-repo `.chainer.toml` > global `~/.config/chainer/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections override independently.
pub fn load_config(repo_root: &Path) -> ChainerConfig {
    let local_path = repo_root.join(".chainer.toml");
    load_config_from(global_config_path().as_deref(), Some(&local_path))
}

fn load_config_from(global_path: Option<&Path>, local_path: Option<&Path>) -> ChainerConfig {
    let global_table = global_path.and_then(read_table);
    let local_table = local_path.and_then(read_table);

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            toml::Value::Table(global)
        }
        (Some(global), None) => toml::Value::Table(global),
        (None, Some(local)) => toml::Value::Table(local),
        (None, None) => return ChainerConfig::default(),
    };

    merged.try_into().unwrap_or_else(|e| {
        log::warn!("Ignoring invalid config: {}", e);
        ChainerConfig::default()
    })
}

fn read_table(path: &Path) -> Option<toml::Table> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<toml::Table>(&content) {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("Could not parse {}: {}", path.display(), e);
            None
        }
    }
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_without_files() {
        let config = load_config_from(None, None);
        assert_eq!(config, ChainerConfig::default());
        assert_eq!(config.threshold.lines, 400);
        assert_eq!(config.git.remote, "origin");
    }

    #[test]
    fn local_fields_override_global_fields_individually() {
        let dir = TempDir::new().unwrap();
        let global = write(
            &dir,
            "global.toml",
            "[threshold]\nlines = 250\nincrement = 50\n[git]\nremote = \"upstream\"\n",
        );
        let local = write(&dir, "local.toml", "[threshold]\nlines = 5\n");

        let config = load_config_from(Some(&global), Some(&local));
        assert_eq!(config.threshold.lines, 5);
        assert_eq!(config.threshold.increment, 50);
        assert_eq!(config.threshold.cooldown_secs, 300);
        assert_eq!(config.git.remote, "upstream");
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "local.toml", "[threshold]\nlines = \"many\"\n");
        assert_eq!(load_config_from(None, Some(&local)), ChainerConfig::default());
    }

    #[test]
    fn unparsable_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let global = write(&dir, "global.toml", "[watch]\ndebounce_ms = 250\n");
        let local = write(&dir, "local.toml", "this is not toml [");
        assert_eq!(load_config_from(Some(&global), Some(&local)).watch.debounce_ms, 250);
    }

    #[test]
    fn repo_file_is_read_from_root() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".chainer.toml", "[threshold]\ncooldown_secs = 42\n");
        // A global file may exist on the machine; only the local field is asserted
        assert_eq!(load_config(dir.path()).threshold.cooldown_secs, 42);
    }

    #[test]
    fn overrides_apply_only_when_set() {
        let config = ChainerConfig::default().with_overrides(Overrides {
            threshold: Some(5),
            increment: None,
            cooldown_secs: Some(10),
        });
        assert_eq!(config.threshold.lines, 5);
        assert_eq!(config.threshold.increment, 100);
        assert_eq!(config.threshold.cooldown_secs, 10);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let text = ChainerConfig::default().to_toml().unwrap();
        assert!(text.contains("[threshold]"));
        let parsed: ChainerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, ChainerConfig::default());
    }
}
