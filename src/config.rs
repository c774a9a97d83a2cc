//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [encoding]
//! max_bytes = 512000        # Upload budget per image (inclusive)
//! max_dimension = 1920      # Longest side after rasterizing
//! initial_quality = 0.8     # First JPEG quality tried
//! quality_step = 0.1        # Decrement per attempt (at least 0.001)
//! min_quality = 0.1         # Give up below this
//!
//! [gallery]
//! min_images = 1
//! max_images = 10
//!
//! [crop]
//! default_fraction = 0.5    # Seed rectangle size on first click
//!
//! [crop.aspect_ratios]      # Fixed ratios per crop context
//! banner = [16, 9]
//! profile = [1, 1]
//! slide = [16, 9]
//!
//! [api]
//! base_url = "http://localhost:3000/api"
//! image_field = "images"
//! keep_field = "existingImages"
//! delete_field = "deletedImages"
//! timeout_secs = 30
//! # media_base_url = "https://cdn.example.org/"  # For bare storage keys
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::gallery::GalleryLimits;
use crate::imaging::{AspectRatio, EncodingBudget};
use crate::submission::FieldNames;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Byte budget and quality ladder.
    pub encoding: EncodingBudget,
    /// Gallery size bounds.
    pub gallery: GalleryLimits,
    /// Crop seeding and per-context aspect ratios.
    pub crop: CropConfig,
    /// Submission endpoint and multipart field names.
    pub api: ApiConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.encoding.validate().map_err(ConfigError::Validation)?;

        let GalleryLimits {
            min_images,
            max_images,
        } = self.gallery;
        if max_images == 0 || min_images > max_images {
            return Err(ConfigError::Validation(format!(
                "gallery bounds must satisfy min_images ({min_images}) <= max_images ({max_images}), max_images > 0"
            )));
        }

        let fraction = self.crop.default_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::Validation(
                "crop.default_fraction must be in (0, 1]".into(),
            ));
        }
        if let Some((name, _)) = self
            .crop
            .aspect_ratios
            .iter()
            .find(|(_, [w, h])| *w == 0 || *h == 0)
        {
            return Err(ConfigError::Validation(format!(
                "crop.aspect_ratios.{name} values must be non-zero"
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Size of the seed rectangle, as a fraction of each side.
    pub default_fraction: f64,
    /// Named crop contexts and their `[width, height]` ratio.
    pub aspect_ratios: BTreeMap<String, [u32; 2]>,
}

impl Default for CropConfig {
    fn default() -> Self {
        let aspect_ratios = [("banner", [16, 9]), ("profile", [1, 1]), ("slide", [16, 9])]
            .into_iter()
            .map(|(name, ratio)| (name.to_string(), ratio))
            .collect();
        Self {
            default_fraction: 0.5,
            aspect_ratios,
        }
    }
}

impl CropConfig {
    /// Aspect ratio for a crop context. No context means a free crop.
    pub fn aspect_for(&self, context: Option<&str>) -> Result<Option<AspectRatio>, ConfigError> {
        let Some(name) = context else {
            return Ok(None);
        };
        match self.aspect_ratios.get(name) {
            Some(ratio) => Ok(Some(AspectRatio::from(*ratio))),
            None => {
                let known: Vec<&str> = self.aspect_ratios.keys().map(String::as_str).collect();
                Err(ConfigError::Validation(format!(
                    "unknown crop context {name:?} (known: {})",
                    known.join(", ")
                )))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL the collection paths are appended to.
    pub base_url: String,
    /// Prefix for identities that are bare storage keys rather than URLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_base_url: Option<String>,
    pub image_field: String,
    pub keep_field: String,
    pub delete_field: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let names = FieldNames::default();
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            media_base_url: None,
            image_field: names.image,
            keep_field: names.keep,
            delete_field: names.delete,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn field_names(&self) -> FieldNames {
        FieldNames {
            image: self.image_field.clone(),
            keep: self.keep_field.clone(),
            delete: self.delete_field.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// URL an identity can be fetched or displayed from.
    ///
    /// Identities that already are URLs pass through; bare keys are joined
    /// onto `media_base_url` when one is configured.
    pub fn identity_url(&self, identity: &str) -> String {
        if identity.starts_with("http://") || identity.starts_with("https://") {
            return identity.to_string();
        }
        match &self.media_base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                identity.trim_start_matches('/')
            ),
            None => identity.to_string(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// File read from the `--config` directory.
pub const CONFIG_FILE: &str = "config.toml";

/// [`PipelineConfig::default`] as a TOML table: the layer user overrides are
/// applied to.
pub fn defaults_table() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Apply `overrides` onto `base` in place.
///
/// Tables combine key by key, so `[crop.aspect_ratios]` in a user file adds
/// contexts next to the stock ones instead of replacing the whole map. Any
/// other value replaces the base value.
pub fn apply_overrides(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => apply_overrides(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Load `config.toml` from `dir` over the stock defaults and validate it.
///
/// A missing file means stock defaults.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    let mut merged = defaults_table()?;
    if path.exists() {
        let overrides: toml::Value = toml::from_str(&fs::read_to_string(&path)?)?;
        apply_overrides(&mut merged, overrides);
        debug!(path = %path.display(), "loaded config overrides");
    }
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# unit-media Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Encoding budget
# ---------------------------------------------------------------------------
[encoding]
# Maximum encoded size per image, in bytes. A result of exactly this size fits.
max_bytes = 512000

# Longest side of the rasterized image, in pixels. Images are never upscaled.
max_dimension = 1920

# JPEG quality ladder: start at initial_quality, step down by quality_step,
# give up once the next rung would fall below min_quality.
# Must satisfy 0 < min_quality <= initial_quality <= 1 and quality_step >= 0.001.
initial_quality = 0.8
quality_step = 0.1
min_quality = 0.1

# ---------------------------------------------------------------------------
# Gallery bounds
# ---------------------------------------------------------------------------
[gallery]
# Submission is refused outside [min_images, max_images].
min_images = 1
max_images = 10

# ---------------------------------------------------------------------------
# Cropping
# ---------------------------------------------------------------------------
[crop]
# A click with no selection seeds a rectangle this fraction of the image.
default_fraction = 0.5

# Fixed aspect ratios per crop context, as [width, height].
# Contexts not listed here crop freely.
[crop.aspect_ratios]
banner = [16, 9]
profile = [1, 1]
slide = [16, 9]

# ---------------------------------------------------------------------------
# Submission API
# ---------------------------------------------------------------------------
[api]
# Collection paths are appended to this URL:
#   create -> POST {base_url}/{collection}
#   update -> PUT  {base_url}/{collection}/{id}
base_url = "http://localhost:3000/api"

# Multipart field names.
image_field = "images"          # One binary part per new image
keep_field = "existingImages"   # JSON array of kept identities
delete_field = "deletedImages"  # JSON array of identities to delete

# Request timeout in seconds.
timeout_secs = 30

# Prefix for identities stored as bare keys rather than full URLs.
# media_base_url = "https://cdn.example.org/uploads"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_upload_budget() {
        let config = PipelineConfig::default();
        assert_eq!(config.encoding.max_bytes, 512_000);
        assert_eq!(config.encoding.max_dimension, 1920);
        assert_eq!(config.gallery.max_images, 10);
        assert_eq!(config.gallery.min_images, 1);
    }

    #[test]
    fn default_config_has_crop_contexts() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.crop.aspect_for(Some("banner")).unwrap(),
            Some(AspectRatio::new(16, 9))
        );
        assert_eq!(
            config.crop.aspect_for(Some("profile")).unwrap(),
            Some(AspectRatio::new(1, 1))
        );
        assert_eq!(config.crop.aspect_for(None).unwrap(), None);
    }

    #[test]
    fn unknown_crop_context_is_error() {
        let err = PipelineConfig::default()
            .crop
            .aspect_for(Some("poster"))
            .unwrap_err();
        assert!(err.to_string().contains("poster"));
    }

    #[test]
    fn parse_partial_config() {
        let config: PipelineConfig = toml::from_str(
            r#"
[encoding]
max_bytes = 200000
"#,
        )
        .unwrap();
        assert_eq!(config.encoding.max_bytes, 200_000);
        assert_eq!(config.encoding.initial_quality, 0.8);
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn stock_config_matches_defaults() {
        let parsed: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, PipelineConfig::default());
    }

    #[test]
    fn stock_defaults_serialize() {
        let value = defaults_table().unwrap();
        assert!(value.get("encoding").is_some());
        // Unset optional keys are omitted
        assert!(value.get("api").unwrap().get("media_base_url").is_none());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[api]
base_url = "https://api.example.org"
media_base_url = "https://cdn.example.org"

[crop.aspect_ratios]
cover = [3, 1]
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.org");
        assert_eq!(
            config.crop.aspect_for(Some("cover")).unwrap(),
            Some(AspectRatio::new(3, 1))
        );
        // Stock contexts survive the merge
        assert!(config.crop.aspect_for(Some("banner")).unwrap().is_some());
        // Unspecified values should be defaults
        assert_eq!(config.api.image_field, "images");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[gallery]
min_images = 5
max_images = 2
"#,
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // validation tests
    // =========================================================================

    #[test]
    fn validate_rejects_inverted_quality_range() {
        let mut config = PipelineConfig::default();
        config.encoding.min_quality = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_aspect() {
        let mut config = PipelineConfig::default();
        config.crop.aspect_ratios.insert("bad".into(), [0, 1]);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("crop.aspect_ratios.bad"));
    }

    #[test]
    fn validate_rejects_out_of_range_fraction() {
        let mut config = PipelineConfig::default();
        config.crop.default_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // api helpers
    // =========================================================================

    #[test]
    fn identity_url_passes_through_urls() {
        let api = ApiConfig::default();
        assert_eq!(
            api.identity_url("https://cdn.example.org/a.jpg"),
            "https://cdn.example.org/a.jpg"
        );
        assert_eq!(api.identity_url("uploads/a.jpg"), "uploads/a.jpg");
    }

    #[test]
    fn identity_url_joins_media_base() {
        let api = ApiConfig {
            media_base_url: Some("https://cdn.example.org/".into()),
            ..ApiConfig::default()
        };
        assert_eq!(
            api.identity_url("/uploads/a.jpg"),
            "https://cdn.example.org/uploads/a.jpg"
        );
    }

    #[test]
    fn field_names_follow_config() {
        let api = ApiConfig {
            image_field: "photos".into(),
            ..ApiConfig::default()
        };
        let names = api.field_names();
        assert_eq!(names.image, "photos");
        assert_eq!(names.keep, "existingImages");
    }

    // =========================================================================
    // apply_overrides tests
    // =========================================================================

    #[test]
    fn overrides_replace_scalars() {
        let mut merged: toml::Value = toml::from_str(r#"max_bytes = 512000"#).unwrap();
        let overrides: toml::Value = toml::from_str(r#"max_bytes = 100000"#).unwrap();
        apply_overrides(&mut merged, overrides);
        assert_eq!(merged.get("max_bytes").unwrap().as_integer(), Some(100_000));
    }

    #[test]
    fn overrides_combine_nested_tables() {
        let mut merged: toml::Value = toml::from_str(
            r#"
[crop.aspect_ratios]
banner = [16, 9]
profile = [1, 1]
"#,
        )
        .unwrap();
        let overrides: toml::Value = toml::from_str(
            r#"
[crop.aspect_ratios]
banner = [3, 1]
"#,
        )
        .unwrap();
        apply_overrides(&mut merged, overrides);
        let ratios = merged.get("crop").unwrap().get("aspect_ratios").unwrap();
        assert_eq!(ratios.get("banner").unwrap().as_array().unwrap()[0].as_integer(), Some(3));
        assert!(ratios.get("profile").is_some());
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str(
            r#"
[encoding]
max_byte = 90
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str(
            r#"
[encodng]
max_bytes = 90
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[api]
timeout = 5
"#,
        )
        .unwrap();
        assert!(load_config(tmp.path()).is_err());
    }
}
