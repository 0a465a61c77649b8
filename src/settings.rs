use std::path::PathBuf;

use crate::effect::{EffectKind, EffectParameters};
use crate::engine::EngineBackend;
use crate::selection::SelectionMode;

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Last used effect controls
    pub effect_kind: EffectKind,
    pub strength: f32,
    /// Fraction of the smaller image side
    pub radius: f32,
    pub selection_mode: SelectionMode,
    /// Re-apply the effect whenever a control or the selection changes
    pub auto_apply: bool,
    pub engine: EngineBackend,
    /// Preferred GPU power profile ("Auto", "Integrated", "Discrete")
    pub preferred_gpu: String,
    /// JPEG quality used when saving the result
    pub jpeg_quality: u8,
}

impl Default for AppSettings {
    fn default() -> Self {
        let params = EffectParameters::default();
        Self {
            effect_kind: params.kind,
            strength: params.strength(),
            radius: params.radius(),
            selection_mode: SelectionMode::Point,
            auto_apply: false,
            engine: EngineBackend::Auto,
            preferred_gpu: "Auto".to_string(),
            jpeg_quality: 90,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/warpfe/warpfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\WarpFE\warpfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/WarpFE/warpfe_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?
                .join("warpfe");
            Some(config_dir.join("warpfe_settings.cfg"))
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            Some(PathBuf::from(appdata).join("WarpFE").join("warpfe_settings.cfg"))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("WarpFE")
                    .join("warpfe_settings.cfg"),
            )
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("warpfe_settings.cfg")))
        }
    }

    /// Effect parameters described by these settings (clamped).
    pub fn effect_parameters(&self) -> EffectParameters {
        EffectParameters::new(self.effect_kind, self.strength, self.radius)
    }

    pub fn store_parameters(&mut self, params: &EffectParameters) {
        self.effect_kind = params.kind;
        self.strength = params.strength();
        self.radius = params.radius();
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "effect_kind={}\n\
             strength={}\n\
             radius={}\n\
             selection_mode={}\n\
             auto_apply={}\n\
             engine={}\n\
             preferred_gpu={}\n\
             jpeg_quality={}\n",
            self.effect_kind.as_str(),
            self.strength,
            self.radius,
            self.selection_mode.as_str(),
            self.auto_apply,
            self.engine.as_str(),
            self.preferred_gpu,
            self.jpeg_quality,
        )
    }

    /// Parse `key=value` lines. Unknown keys and bad values keep the defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "effect_kind" => {
                    if let Some(kind) = EffectKind::parse(val) {
                        s.effect_kind = kind;
                    }
                }
                "strength" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                    {
                        s.strength = v.clamp(-1.0, 1.0);
                    }
                }
                "radius" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                    {
                        s.radius = v.clamp(0.0, 1.0);
                    }
                }
                "selection_mode" => {
                    if let Some(mode) = SelectionMode::parse(val) {
                        s.selection_mode = mode;
                    }
                }
                "auto_apply" => s.auto_apply = val == "true",
                "engine" => {
                    if let Some(engine) = EngineBackend::parse(val) {
                        s.engine = engine;
                    }
                }
                "preferred_gpu" => s.preferred_gpu = val.to_string(),
                "jpeg_quality" => {
                    s.jpeg_quality = val.parse::<u8>().unwrap_or(90).clamp(1, 100);
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_text_restores_every_field() {
        let s = AppSettings {
            effect_kind: EffectKind::Pinch,
            strength: -0.25,
            radius: 0.8,
            selection_mode: SelectionMode::Region,
            auto_apply: true,
            engine: EngineBackend::Cpu,
            preferred_gpu: "Integrated".to_string(),
            jpeg_quality: 75,
        };
        assert_eq!(AppSettings::from_config_str(&s.to_config_string()), s);
    }

    #[test]
    fn bad_values_fall_back_or_clamp() {
        let s = AppSettings::from_config_str(
            "effect_kind=swirl\nstrength=7\nradius=abc\nengine=quantum\njpeg_quality=0\nnot a line\n",
        );
        let d = AppSettings::default();
        assert_eq!(s.effect_kind, d.effect_kind);
        assert_eq!(s.strength, 1.0);
        assert_eq!(s.radius, d.radius);
        assert_eq!(s.engine, d.engine);
        assert_eq!(s.jpeg_quality, 1);
    }

    #[test]
    fn parameters_round_trip_through_settings() {
        let mut s = AppSettings::default();
        let p = EffectParameters::new(EffectKind::Pinch, 0.3, 0.6);
        s.store_parameters(&p);
        assert_eq!(s.effect_parameters(), p);
    }
}
