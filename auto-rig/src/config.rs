//! Rigging settings loaded from RON files
//!
//! Every field has a default, so a settings file only needs to name what it
//! changes:
//!
//! ```ron
//! (
//!     strategy: Distance,
//!     distance: (blend: InverseSquare),
//! )
//! ```

use std::{fs, path::Path};

use log::error;
use serde::{Deserialize, Serialize};

use crate::{
    animation::ClipKind,
    error::{Error, Result},
    region::ZoneProfile,
    skeleton::SkeletonSettings,
};

/// Loading and saving of RON-backed settings structures
pub trait Config
where
    Self: Sized,
{
    /// Loads a settings structure from a file.
    /// Defaults if the file fails in any way.
    fn load<P: AsRef<Path>>(path: P) -> Self;

    /// Loads a settings structure from a file.
    fn load_no_fallback<P: AsRef<Path>>(path: P) -> Result<Self>;

    /// Loads a settings structure from raw bytes.
    fn load_bytes(bytes: &[u8]) -> Result<Self>;

    /// Serializes to a pretty-printed RON string.
    fn to_ron_string(&self) -> Result<String>;

    /// Writes a settings structure to a file.
    fn write<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

impl<T> Config for T
where
    T: for<'a> Deserialize<'a> + Serialize + Default,
{
    fn load<P: AsRef<Path>>(path: P) -> Self {
        Self::load_no_fallback(path.as_ref()).unwrap_or_else(|e| {
            error!(
                "Failed to load settings file '{}': {}",
                path.as_ref().display(),
                e
            );
            Self::default()
        })
    }

    fn load_no_fallback<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("ron") {
            return Err(Error::unsupported_format(format!(
                "{}: expected a .ron settings file",
                path.display()
            )));
        }
        let content = fs::read(path)?;
        Self::load_bytes(&content)
    }

    fn load_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(ron::de::from_bytes(bytes)?)
    }

    fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(Error::serialization)
    }

    fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_ron_string()?;
        fs::write(path, s)?;
        Ok(())
    }
}

/// Which weighting strategy the pipeline tries first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Envelope weighting, falling back to distance and then zone weighting
    Envelope,
    /// Distance weighting, falling back to zone weighting
    Distance,
    /// Zone weighting only
    #[default]
    Zone,
}

/// How distance weighting blends the nearest joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceBlend {
    /// Linear blend of the two nearest joints
    NearestPair,
    /// Inverse-square blend of up to four nearby joints
    #[default]
    InverseSquare,
}

/// Tunables for distance weighting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceSettings {
    pub blend: DistanceBlend,
    /// Closer than this, a vertex snaps to the nearest joint
    pub near_zero: f32,
    /// Segments shorter than this are measured from their head only
    pub min_segment: f32,
    /// Candidate joints considered by the inverse-square blend
    pub max_candidates: usize,
    /// Candidates farther than `cutoff_factor * nearest + cutoff_margin` are ignored
    pub cutoff_factor: f32,
    pub cutoff_margin: f32,
    /// Added to squared distances before inverting
    pub epsilon: f32,
}

impl Default for DistanceSettings {
    fn default() -> Self {
        Self {
            blend: DistanceBlend::InverseSquare,
            near_zero: 0.001,
            min_segment: 0.001,
            max_candidates: 4,
            cutoff_factor: 3.0,
            cutoff_margin: 0.02,
            epsilon: 1e-6,
        }
    }
}

/// Everything the pipeline can be tuned with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigSettings {
    pub strategy: StrategyKind,
    pub distance: DistanceSettings,
    pub zones: ZoneProfile,
    pub skeleton: SkeletonSettings,
    /// Weights at or below this are discarded
    pub significance: f32,
    /// Renormalize after discarding insignificant weights
    pub renormalize_after_prune: bool,
    /// Solve vertices in parallel when the `parallel` feature is enabled
    pub parallel: bool,
    /// Meshes shorter than this cannot be rigged
    pub min_height: f32,
    /// Clips to generate
    pub clips: Vec<ClipKind>,
}

impl Default for RigSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Zone,
            distance: DistanceSettings::default(),
            zones: ZoneProfile::default(),
            skeleton: SkeletonSettings::default(),
            significance: 0.01,
            renormalize_after_prune: true,
            parallel: true,
            min_height: 1e-4,
            clips: ClipKind::ALL.to_vec(),
        }
    }
}

impl RigSettings {
    /// Check numeric settings for values the solver cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.significance >= 0.0 && self.significance < 1.0) {
            return Err(Error::invalid_parameter(format!(
                "significance must be in [0, 1), got {}",
                self.significance
            )));
        }
        if !(self.min_height > 0.0) {
            return Err(Error::invalid_parameter(format!(
                "min_height must be positive, got {}",
                self.min_height
            )));
        }
        if self.distance.max_candidates == 0 {
            return Err(Error::invalid_parameter(
                "distance weighting needs at least one candidate",
            ));
        }
        if !(self.distance.epsilon > 0.0) {
            return Err(Error::invalid_parameter(format!(
                "distance epsilon must be positive, got {}",
                self.distance.epsilon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings = RigSettings::load_bytes(
            b"(strategy: Distance, distance: (blend: NearestPair), significance: 0.02)",
        )
        .unwrap();
        assert_eq!(settings.strategy, StrategyKind::Distance);
        assert_eq!(settings.distance.blend, DistanceBlend::NearestPair);
        assert_eq!(settings.distance.max_candidates, 4);
        assert_eq!(settings.significance, 0.02);
        assert!(settings.renormalize_after_prune);
        assert_eq!(settings.zones, ZoneProfile::humanoid());
    }

    #[test]
    fn test_ron_round_trip() {
        let mut settings = RigSettings::default();
        settings.renormalize_after_prune = false;
        settings.clips = vec![ClipKind::Wave];
        let text = settings.to_ron_string().unwrap();
        let back = RigSettings::load_bytes(text.as_bytes()).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_malformed_settings() {
        let err = RigSettings::load_bytes(b"(strategy: Sideways)").unwrap_err();
        assert!(matches!(err, Error::SettingsParse(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_wrong_extension() {
        let err = RigSettings::load_no_fallback("settings.toml").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_falls_back_to_default() {
        let settings = RigSettings::load("does/not/exist.ron");
        assert_eq!(settings, RigSettings::default());
    }

    #[test]
    fn test_validate() {
        assert!(RigSettings::default().validate().is_ok());
        let mut settings = RigSettings::default();
        settings.significance = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
