use crate::catalog::Catalog;
use crate::model::Settings;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "moodtune";
const SETTINGS_FILE: &str = "settings.json";
const CATALOG_FILE: &str = "catalog.json";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("MOODTUNE_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = if cfg!(windows) {
        env::var("USERPROFILE").context("USERPROFILE is not set")?
    } else {
        env::var("HOME").context("HOME is not set")?
    };
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn default_catalog_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CATALOG_FILE))
}

pub fn log_dir() -> Result<PathBuf> {
    Ok(config_root()?.join("logs"))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    let path = settings_path()?;
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(sanitize(settings))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    ensure_config_dir()?;
    let path = settings_path()?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Ok(Catalog::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file {}", path.display()))?;
    let catalog: Catalog = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse catalog file {}", path.display()))?;
    Ok(catalog.resolve_relative_to(path.parent().unwrap_or(Path::new("."))))
}

fn sanitize(mut settings: Settings) -> Settings {
    if !settings.volume.is_finite() {
        settings.volume = Settings::default().volume;
    }
    settings.volume = settings.volume.clamp(0.0, 1.0);
    settings.max_fps = settings.max_fps.clamp(1, 30);
    settings.bin_count = settings.bin_count.clamp(8, 32);
    settings.fade_step_ms = settings.fade_step_ms.max(1);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepeatMode;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        unsafe {
            env::set_var("MOODTUNE_CONFIG_DIR", dir.path().to_string_lossy().as_ref());
        }

        let mut settings = Settings {
            repeat: RepeatMode::One,
            shuffle: true,
            ..Settings::default()
        };
        settings.likes.insert(String::from("t1"), true);
        save_settings(&settings).expect("save");
        let loaded = load_settings().expect("load");
        assert_eq!(loaded.repeat, RepeatMode::One);
        assert!(loaded.shuffle);
        assert_eq!(loaded.likes.get("t1"), Some(&true));
    }

    #[test]
    fn out_of_range_settings_are_clamped() {
        let settings: Settings =
            serde_json::from_str(r#"{"volume":4.0,"max_fps":240,"bin_count":2}"#).expect("parse");
        let settings = sanitize(settings);
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.max_fps, 30);
        assert_eq!(settings.bin_count, 8);
    }

    #[test]
    fn missing_catalog_is_empty() {
        let dir = tempdir().expect("tempdir");
        let catalog = load_catalog(&dir.path().join("nope.json")).expect("load");
        assert!(catalog.playlists.is_empty());
    }

    #[test]
    fn catalog_sources_resolve_against_catalog_dir() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"playlists":[{"id":"calm","title":"Calm","mood":"sad","tracks":[
                {"id":"a","title":"A","artist":"X","source":"music/a.mp3"}]}]}"#,
        )
        .expect("write");

        let catalog = load_catalog(&path).expect("load");
        assert_eq!(
            catalog.playlists[0].tracks[0].source,
            dir.path().join("music/a.mp3")
        );
    }
}
