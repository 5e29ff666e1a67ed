use anyhow::{Context, Result};
use directories::BaseDirs;
use mindbridge_core::config::validate_base_url;
use mindbridge_core::{ClientSettings, Language};
use std::path::{Path, PathBuf};

/// Values given on the command line. They win over the file and the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub api_url: Option<String>,
    pub language: Option<Language>,
}

pub fn load_settings(overrides: &Overrides) -> Result<ClientSettings> {
    let settings = ClientSettings::load().context("failed to load mindbridge.yaml")?;
    apply_overrides(settings, overrides)
}

pub fn apply_overrides(mut settings: ClientSettings, overrides: &Overrides) -> Result<ClientSettings> {
    if let Some(url) = &overrides.api_url {
        settings.api_base_url = validate_base_url(url).context("invalid --api-url")?;
    }
    if let Some(language) = overrides.language {
        settings.language = language;
    }
    if let Some(dir) = &overrides.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    Ok(settings)
}

/// Where the local store lives: explicit setting, else the platform data
/// directory, else `./.mindbridge`.
pub fn storage_root(settings: &ClientSettings) -> PathBuf {
    match &settings.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir(),
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(base) = BaseDirs::new() {
        base.data_dir().join("mindbridge")
    } else {
        Path::new(".mindbridge").to_path_buf()
    }
}
