use std::path::PathBuf;
use std::time::Duration;
use serde::{Serialize, Deserialize};

/// Upper bound for the reload interval, one week.
const MAX_RELOAD_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
const DEFAULT_RELOAD_INTERVAL_MINUTES: u64 = 5;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AppConfig {
    pub log_level: String,
    pub cache_path: PathBuf,
    /// `local`, `utc` or a fixed offset such as `+02:00`.
    pub time_zone: String,
    pub reload_interval_minutes: u64,
    /// View the gallery opens in: `all`, `days`, `months` or `years`.
    pub default_view: String,
    pub trace_spans: bool,
}

#[derive(Default)]
pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub time_zone: Option<String>,
    pub reload_interval_minutes: Option<u64>,
    pub default_view: Option<String>,
    pub trace_spans: bool,
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cu_gallery")
}

impl AppConfig {
    /// Location read by `load_from(None)`.
    pub fn default_path() -> PathBuf {
        default_base_dir().join("config")
    }

    pub fn load_from(path: Option<PathBuf>) -> Self {
        let mut builder = config::Config::builder();
        let path = path.unwrap_or_else(Self::default_path);
        builder = builder.add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(false),
        );
        let cfg = builder.build().unwrap_or_default();

        let log_level = cfg
            .get_string("log_level")
            .unwrap_or_else(|_| "info".to_string());
        let cache_path = cfg
            .get_string("cache_path")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_base_dir());
        let time_zone = cfg
            .get_string("time_zone")
            .unwrap_or_else(|_| "local".to_string());
        let reload_interval_minutes = cfg
            .get_int("reload_interval_minutes")
            .ok()
            .and_then(|m| u64::try_from(m).ok())
            .unwrap_or(DEFAULT_RELOAD_INTERVAL_MINUTES);
        let default_view = cfg
            .get_string("default_view")
            .unwrap_or_else(|_| "all".to_string());
        let trace_spans = cfg.get_bool("trace_spans").unwrap_or(false);

        Self {
            log_level,
            cache_path,
            time_zone,
            reload_interval_minutes,
            default_view,
            trace_spans,
        }
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(p) = &ov.cache_path {
            self.cache_path = p.clone();
        }
        if let Some(z) = &ov.time_zone {
            self.time_zone = z.clone();
        }
        if let Some(m) = ov.reload_interval_minutes {
            self.reload_interval_minutes = m;
        }
        if let Some(v) = &ov.default_view {
            self.default_view = v.clone();
        }
        if ov.trace_spans {
            self.trace_spans = true;
        }
        self
    }

    #[allow(dead_code)]
    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<()> {
        let path = path.unwrap_or_else(Self::default_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)
    }

    /// Reload period, clamped to between one minute and one week.
    #[allow(dead_code)]
    pub fn reload_interval(&self) -> Duration {
        let minutes = self
            .reload_interval_minutes
            .clamp(1, MAX_RELOAD_INTERVAL_MINUTES);
        Duration::from_secs(minutes.saturating_mul(60))
    }

    pub fn db_path(&self) -> PathBuf {
        self.cache_path.join("cache.sqlite")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let cfg = AppConfig::load_from(Some(dir.path().join("absent")));
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.time_zone, "local");
        assert_eq!(cfg.reload_interval_minutes, 5);
        assert_eq!(cfg.default_view, "all");
        assert!(!cfg.trace_spans);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        let mut cfg = AppConfig::load_from(Some(path.clone()));
        cfg.time_zone = "+02:00".into();
        cfg.reload_interval_minutes = 15;
        cfg.cache_path = dir.path().join("store");
        cfg.save_to(Some(path.clone())).unwrap();

        let loaded = AppConfig::load_from(Some(path));
        assert_eq!(loaded.time_zone, "+02:00");
        assert_eq!(loaded.reload_interval_minutes, 15);
        assert_eq!(loaded.cache_path, dir.path().join("store"));
    }

    #[test]
    fn reload_interval_is_clamped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "reload_interval_minutes = -3\n").unwrap();
        let cfg = AppConfig::load_from(Some(path));
        assert_eq!(cfg.reload_interval_minutes, DEFAULT_RELOAD_INTERVAL_MINUTES);

        let cfg = cfg.apply_overrides(&AppConfigOverrides {
            reload_interval_minutes: Some(u64::MAX),
            ..Default::default()
        });
        assert_eq!(
            cfg.reload_interval(),
            Duration::from_secs(MAX_RELOAD_INTERVAL_MINUTES * 60)
        );

        let cfg = cfg.apply_overrides(&AppConfigOverrides {
            reload_interval_minutes: Some(0),
            ..Default::default()
        });
        assert_eq!(cfg.reload_interval(), Duration::from_secs(60));
    }

    #[test]
    fn overrides_win() {
        let dir = tempdir().unwrap();
        let cfg = AppConfig::load_from(Some(dir.path().join("absent"))).apply_overrides(
            &AppConfigOverrides {
                log_level: Some("debug".into()),
                default_view: Some("years".into()),
                trace_spans: true,
                ..Default::default()
            },
        );
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.default_view, "years");
        assert!(cfg.trace_spans);
        assert_eq!(cfg.time_zone, "local");
    }
}
