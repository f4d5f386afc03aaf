use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

/// Tuning for the live POI overlay scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub max_area_km2: f64,
    pub debounce_ms: u64,
    /// Courtesy delay after a successful fetch.
    pub success_cooldown_ms: u64,
    /// Retry delay after a failure that is not a rate limit.
    pub failure_cooldown_ms: u64,
    pub backoff_floor_ms: u64,
    pub backoff_ceiling_ms: u64,
    pub overpass_url: String,
    pub request_timeout_secs: u64,
    /// Preferred language suffix for `name:*` and `description:*` tags.
    pub description_lang: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            max_area_km2: 2500.0,
            debounce_ms: 650,
            success_cooldown_ms: 800,
            failure_cooldown_ms: 1500,
            backoff_floor_ms: 2000,
            backoff_ceiling_ms: 30_000,
            overpass_url: "https://overpass-api.de/api/interpreter".into(),
            request_timeout_secs: 25,
            description_lang: "en".into(),
        }
    }
}

impl OverlaySettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn success_cooldown(&self) -> Duration {
        Duration::from_millis(self.success_cooldown_ms)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }
}

/// Tuning for off-screen route snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    pub width: u32,
    pub height: u32,
    pub zoom: f64,
    pub tile_wait_timeout_ms: u64,
    pub fit_padding_px: u32,
    pub label_max_lines: usize,
    pub cache_capacity: usize,
    pub tile_url_template: String,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            zoom: 10.0,
            tile_wait_timeout_ms: 1500,
            fit_padding_px: 28,
            label_max_lines: 3,
            cache_capacity: 32,
            tile_url_template:
                "https://a.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}.png".into(),
        }
    }
}

impl SnapshotSettings {
    pub fn tile_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.tile_wait_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredSettings {
    overlay: OverlaySettings,
    snapshot: SnapshotSettings,
}

/// JSON-file backed settings. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StoredSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings at {}: {err}",
                    path.display()
                );
                StoredSettings::default()
            })
        } else {
            StoredSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn overlay(&self) -> OverlaySettings {
        self.read().overlay.clone()
    }

    pub fn snapshot(&self) -> SnapshotSettings {
        self.read().snapshot.clone()
    }

    pub fn update_overlay(&self, settings: OverlaySettings) -> Result<()> {
        let mut guard = self.write();
        guard.overlay = settings;
        self.persist(&guard)
    }

    pub fn update_snapshot(&self, settings: SnapshotSettings) -> Result<()> {
        let mut guard = self.write();
        guard.snapshot = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoredSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoredSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &StoredSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.overlay(), OverlaySettings::default());
        assert_eq!(store.snapshot(), SnapshotSettings::default());
    }

    #[test]
    fn updates_are_persisted_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        let mut overlay = store.overlay();
        overlay.debounce_ms = 400;
        overlay.backoff_ceiling_ms = 60_000;
        store.update_overlay(overlay).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.overlay().debounce_ms, 400);
        assert_eq!(reloaded.overlay().backoff_ceiling_ms, 60_000);
        assert_eq!(reloaded.snapshot(), SnapshotSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"snapshot": {"width": 1400, "height": 900}}"#).unwrap();

        let store = SettingsStore::new(path).unwrap();
        let snapshot = store.snapshot();
        assert_eq!((snapshot.width, snapshot.height), (1400, 900));
        assert_eq!(snapshot.tile_wait_timeout_ms, 1500);
        assert_eq!(store.overlay().max_area_km2, 2500.0);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.overlay(), OverlaySettings::default());
    }
}
