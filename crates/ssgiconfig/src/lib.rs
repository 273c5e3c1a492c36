//! On-disk settings for the ssgi effect.
//!
//! The file groups the tunables the way an editor panel would and adds the
//! host-side choices (clip convention, memory budget) that are not part of
//! [`ssgi::Settings`]. Parsing always validates; a loaded file is in range.

use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use ssgi::settings::ranges;
use ssgi::{ClipSpace, RenderMode, Settings};

pub const FILE_NAME: &str = "ssgi.toml";
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub raymarch: RayMarchSection,
    #[serde(default)]
    pub lighting: LightingSection,
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RayMarchSection {
    pub sample_count: u32,
    pub max_gi_ray_distance: f32,
    pub max_ao_ray_distance: f32,
    pub intersection_thickness: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightingSection {
    pub gi_intensity: f32,
    pub ao_intensity: f32,
    pub sample_clamp_value: f32,
    pub cosine_weighted_sampling: bool,
    pub render_mode: RenderMode,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSection {
    pub resolution_scale: f32,
    pub iterations: u32,
    pub radius: f32,
    pub depth_weight: f32,
    pub normal_weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub clip_space: ClipSpace,
    /// Cap on transient target memory; absent means unbounded.
    #[serde(
        deserialize_with = "deserialize_budget_opt",
        serialize_with = "serialize_budget_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub memory_budget: Option<MemoryBudgetSetting>,
}

/// Budget in whole mebibytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudgetSetting {
    mib: u64,
}

impl MemoryBudgetSetting {
    pub fn from_mib(mib: u64) -> Self {
        Self { mib }
    }

    pub fn mib(self) -> u64 {
        self.mib
    }
}

impl fmt::Display for MemoryBudgetSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MiB", self.mib)
    }
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl Default for RayMarchSection {
    fn default() -> Self {
        let s = Settings::default();
        Self {
            sample_count: s.sample_count,
            max_gi_ray_distance: s.max_gi_ray_distance,
            max_ao_ray_distance: s.max_ao_ray_distance,
            intersection_thickness: s.intersection_thickness,
        }
    }
}

impl Default for LightingSection {
    fn default() -> Self {
        let s = Settings::default();
        Self {
            gi_intensity: s.gi_intensity,
            ao_intensity: s.ao_intensity,
            sample_clamp_value: s.sample_clamp_value,
            cosine_weighted_sampling: s.cosine_weighted_sampling,
            render_mode: s.render_mode,
        }
    }
}

impl Default for FilterSection {
    fn default() -> Self {
        let s = Settings::default();
        Self {
            resolution_scale: s.resolution_scale,
            iterations: s.filter_iterations,
            radius: s.filter_radius,
            depth_weight: s.depth_weight,
            normal_weight: s.normal_weight,
        }
    }
}

fn deserialize_budget_opt<'de, D>(deserializer: D) -> Result<Option<MemoryBudgetSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;

    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<MemoryBudgetSetting>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a size in MiB (integer) or a string such as \"512MiB\" or \"2GiB\"")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_budget(v).map(Some).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(MemoryBudgetSetting::from_mib(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(v)
                .map(|mib| Some(MemoryBudgetSetting::from_mib(mib)))
                .map_err(|_| E::custom("memory_budget must be non-negative"))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_budget_opt<S>(
    value: &Option<MemoryBudgetSetting>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(budget) => serializer.serialize_u64(budget.mib),
        None => serializer.serialize_none(),
    }
}

fn parse_budget(raw: &str) -> Result<MemoryBudgetSetting, String> {
    let trimmed = raw.trim();
    let (digits, multiplier) = if let Some(value) = trimmed.strip_suffix("GiB") {
        (value, 1024)
    } else if let Some(value) = trimmed.strip_suffix("MiB") {
        (value, 1)
    } else {
        (trimmed, 1)
    };
    let amount: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid memory budget '{raw}'"))?;
    amount
        .checked_mul(multiplier)
        .map(MemoryBudgetSetting::from_mib)
        .ok_or_else(|| format!("memory budget '{raw}' is too large"))
}

impl ConfigFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ConfigFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            version: CURRENT_VERSION,
            raymarch: RayMarchSection {
                sample_count: settings.sample_count,
                max_gi_ray_distance: settings.max_gi_ray_distance,
                max_ao_ray_distance: settings.max_ao_ray_distance,
                intersection_thickness: settings.intersection_thickness,
            },
            lighting: LightingSection {
                gi_intensity: settings.gi_intensity,
                ao_intensity: settings.ao_intensity,
                sample_clamp_value: settings.sample_clamp_value,
                cosine_weighted_sampling: settings.cosine_weighted_sampling,
                render_mode: settings.render_mode,
            },
            filter: FilterSection {
                resolution_scale: settings.resolution_scale,
                iterations: settings.filter_iterations,
                radius: settings.filter_radius,
                depth_weight: settings.depth_weight,
                normal_weight: settings.normal_weight,
            },
            output: OutputSection::default(),
        }
    }

    pub fn to_settings(&self) -> Settings {
        Settings {
            sample_count: self.raymarch.sample_count,
            max_gi_ray_distance: self.raymarch.max_gi_ray_distance,
            max_ao_ray_distance: self.raymarch.max_ao_ray_distance,
            intersection_thickness: self.raymarch.intersection_thickness,
            gi_intensity: self.lighting.gi_intensity,
            ao_intensity: self.lighting.ao_intensity,
            sample_clamp_value: self.lighting.sample_clamp_value,
            cosine_weighted_sampling: self.lighting.cosine_weighted_sampling,
            resolution_scale: self.filter.resolution_scale,
            filter_iterations: self.filter.iterations,
            filter_radius: self.filter.radius,
            depth_weight: self.filter.depth_weight,
            normal_weight: self.filter.normal_weight,
            render_mode: self.lighting.render_mode,
        }
    }

    pub fn clip_space(&self) -> ClipSpace {
        self.output.clip_space
    }

    pub fn memory_budget(&self) -> Option<MemoryBudgetSetting> {
        self.output.memory_budget
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CURRENT_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CURRENT_VERSION}",
                self.version
            )));
        }

        let r = &self.raymarch;
        check_u32("raymarch.sample_count", r.sample_count, ranges::SAMPLE_COUNT)?;
        check_f32(
            "raymarch.max_gi_ray_distance",
            r.max_gi_ray_distance,
            ranges::MAX_GI_RAY_DISTANCE,
        )?;
        check_f32(
            "raymarch.max_ao_ray_distance",
            r.max_ao_ray_distance,
            ranges::MAX_AO_RAY_DISTANCE,
        )?;
        check_f32(
            "raymarch.intersection_thickness",
            r.intersection_thickness,
            ranges::INTERSECTION_THICKNESS,
        )?;

        let l = &self.lighting;
        check_f32("lighting.gi_intensity", l.gi_intensity, ranges::GI_INTENSITY)?;
        check_f32("lighting.ao_intensity", l.ao_intensity, ranges::AO_INTENSITY)?;
        check_f32(
            "lighting.sample_clamp_value",
            l.sample_clamp_value,
            ranges::SAMPLE_CLAMP_VALUE,
        )?;

        let f = &self.filter;
        check_f32(
            "filter.resolution_scale",
            f.resolution_scale,
            ranges::RESOLUTION_SCALE,
        )?;
        check_u32("filter.iterations", f.iterations, ranges::FILTER_ITERATIONS)?;
        check_f32("filter.radius", f.radius, ranges::FILTER_RADIUS)?;
        check_f32("filter.depth_weight", f.depth_weight, ranges::DEPTH_WEIGHT)?;
        check_f32("filter.normal_weight", f.normal_weight, ranges::NORMAL_WEIGHT)?;

        if let Some(budget) = self.output.memory_budget {
            if budget.mib() == 0 {
                return Err(ConfigError::Invalid(
                    "output.memory_budget must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }
}

fn check_u32(field: &str, value: u32, range: RangeInclusive<u32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} = {value} is outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}

fn check_f32(field: &str, value: f32, range: RangeInclusive<f32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{field} = {value} is outside {}..={}",
            range.start(),
            range.end()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[raymarch]
sample_count = 32
max_gi_ray_distance = 40.0

[lighting]
ao_intensity = 0.0
render_mode = "gi"

[filter]
resolution_scale = 0.25
iterations = 3
radius = 1.5

[output]
clip_space = "reversed_z"
memory_budget = "1GiB"
"#;

    #[test]
    fn parses_sample_config() {
        let config = ConfigFile::from_toml_str(SAMPLE).expect("parse config");
        let settings = config.to_settings();
        assert_eq!(settings.sample_count, 32);
        assert_eq!(settings.max_gi_ray_distance, 40.0);
        assert_eq!(settings.max_ao_ray_distance, 2.0);
        assert_eq!(settings.render_mode, RenderMode::Gi);
        assert_eq!(settings.filter_iterations, 3);
        assert_eq!(settings.depth_weight, 10.0);
        assert_eq!(config.clip_space(), ClipSpace::ReversedZ);
        assert_eq!(config.memory_budget(), Some(MemoryBudgetSetting::from_mib(1024)));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = ConfigFile::from_toml_str("").expect("parse config");
        assert_eq!(config.to_settings(), Settings::default());
        assert_eq!(config.clip_space(), ClipSpace::ZeroToOne);
        assert_eq!(config.memory_budget(), None);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = ConfigFile::from_toml_str("[filter]\niterations = 9\n").unwrap_err();
        match err {
            ConfigError::Invalid(message) => {
                assert!(message.contains("filter.iterations"), "{message}")
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = ConfigFile::from_toml_str("[raymarch]\nsample_count = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_version_and_fields() {
        assert!(matches!(
            ConfigFile::from_toml_str("version = 2"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ConfigFile::from_toml_str("[filter]\nradius_px = 1.0\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn budget_accepts_integers_and_suffixed_strings() {
        let plain = ConfigFile::from_toml_str("[output]\nmemory_budget = 256\n").unwrap();
        assert_eq!(plain.memory_budget(), Some(MemoryBudgetSetting::from_mib(256)));

        let suffixed = ConfigFile::from_toml_str("[output]\nmemory_budget = \"512MiB\"\n").unwrap();
        assert_eq!(suffixed.memory_budget().map(|b| b.mib()), Some(512));

        assert!(ConfigFile::from_toml_str("[output]\nmemory_budget = \"lots\"\n").is_err());
        assert!(ConfigFile::from_toml_str("[output]\nmemory_budget = 0\n").is_err());
    }

    #[test]
    fn rendered_defaults_parse_back() {
        let mut config = ConfigFile::default();
        config.output.memory_budget = Some(MemoryBudgetSetting::from_mib(64));
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[filter]"));
        assert_eq!(ConfigFile::from_toml_str(&text).unwrap(), config);
    }
}
