//! TOML configuration of the engine.
//!
//! Every section and key is optional. Missing keys keep the built-in defaults of the engine,
//! so an empty file describes the default configuration.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use tailor::ConfigError;
use tailor::config::EngineConfig;
use tailor::model::{JobClass, ResourceModel};
use tailor::partition::{PartitionCatalog, PartitionRole, PartitionThresholds, StrategyKind};
use tailor::units::hours_to_duration;

use crate::DEFAULT_CONFIG_FILE;
use crate::common::utils::time::{duration_to_hours, parse_hms_or_human_time};

fn deserialize_human_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let buf = Option::<String>::deserialize(deserializer)?;

    if let Some(b) = buf {
        parse_hms_or_human_time(&b)
            .map(Some)
            .map_err(serde::de::Error::custom)
    } else {
        Ok(None)
    }
}

fn serialize_human_duration_opt<S>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match duration {
        Some(duration) => {
            serializer.serialize_str(&humantime::format_duration(*duration).to_string())
        }
        None => serializer.serialize_none(),
    }
}

fn hours_to_config_duration(hours: f64) -> Option<Duration> {
    Some(Duration::from_secs(hours_to_duration(hours).as_secs()))
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LimitsDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_memory_gb: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_human_duration_opt",
        serialize_with = "serialize_human_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_time: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ThresholdsDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bigmem_memory_gb: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_human_duration_opt",
        serialize_with = "serialize_human_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub quick_time: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_memory_gb: Option<f64>,
}

/// When at least one role is named, only the named roles exist on the cluster.
/// Otherwise every role is served by a partition of the same name.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartitionsDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bigmem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_options: Vec<String>,
    #[serde(default)]
    pub thresholds: ThresholdsDef,
}

impl PartitionsDef {
    fn role(&self, role: PartitionRole) -> Option<&String> {
        match role {
            PartitionRole::Compute => self.compute.as_ref(),
            PartitionRole::Bigmem => self.bigmem.as_ref(),
            PartitionRole::Gpu => self.gpu.as_ref(),
            PartitionRole::Quick => self.quick.as_ref(),
        }
    }

    fn role_mut(&mut self, role: PartitionRole) -> &mut Option<String> {
        match role {
            PartitionRole::Compute => &mut self.compute,
            PartitionRole::Bigmem => &mut self.bigmem,
            PartitionRole::Gpu => &mut self.gpu,
            PartitionRole::Quick => &mut self.quick,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ClassDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_gb: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_human_duration_opt",
        serialize_with = "serialize_human_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_options: Option<Vec<String>>,
}

/// Contents of a configuration file.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub limits: LimitsDef,
    #[serde(default)]
    pub partitions: PartitionsDef,
    /// Keyed by job class name, e.g. `memory-intensive`.
    #[serde(default)]
    pub classes: BTreeMap<String, ClassDef>,
}

impl ConfigFile {
    /// Applies the file on top of the built-in defaults and validates the result.
    pub fn into_engine_config(self) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig::default();

        let LimitsDef {
            max_cpus,
            max_memory_gb,
            max_time,
            max_attempts,
        } = self.limits;
        if let Some(cpus) = max_cpus {
            config.ceilings.max_cpus = cpus;
        }
        if let Some(memory) = max_memory_gb {
            config.ceilings.max_memory_gb = memory;
        }
        if let Some(time) = max_time {
            config.ceilings.max_time_hours = duration_to_hours(time);
        }
        if let Some(attempts) = max_attempts {
            config.max_attempts = attempts;
        }

        config.catalog = build_catalog(&self.partitions);
        if let Some(strategy) = self.partitions.strategy {
            config.strategy = strategy;
        }

        apply_classes(&mut config.model, self.classes)?;

        config.validate()?;
        Ok(config)
    }

    /// Describes an engine configuration with all limits, partitions and classes spelled out.
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        let mut partitions = PartitionsDef {
            strategy: Some(config.strategy),
            default: config
                .catalog
                .default_partition()
                .filter(|p| Some(*p) != config.catalog.get(PartitionRole::Compute))
                .map(|p| p.to_string()),
            custom_options: config.catalog.custom_options().to_vec(),
            thresholds: ThresholdsDef {
                bigmem_memory_gb: Some(config.catalog.thresholds().bigmem_memory_gb),
                quick_time: hours_to_config_duration(config.catalog.thresholds().quick_time_hours),
                quick_memory_gb: Some(config.catalog.thresholds().quick_memory_gb),
            },
            ..Default::default()
        };
        for (role, name) in config.catalog.partitions() {
            *partitions.role_mut(role) = Some(name.to_string());
        }

        let classes = config
            .model
            .iter()
            .map(|(class, model)| {
                let def = ClassDef {
                    cpus: Some(model.base.cpus),
                    memory_gb: Some(model.base.memory_gb),
                    time: hours_to_config_duration(model.base.time_hours),
                    cpu_factor: Some(model.factors.cpu),
                    memory_factor: Some(model.factors.memory),
                    time_factor: Some(model.factors.time),
                    custom_options: Some(model.custom_options.clone()),
                };
                (class.name().replace('_', "-"), def)
            })
            .collect();

        ConfigFile {
            limits: LimitsDef {
                max_cpus: Some(config.ceilings.max_cpus),
                max_memory_gb: Some(config.ceilings.max_memory_gb),
                max_time: hours_to_config_duration(config.ceilings.max_time_hours),
                max_attempts: Some(config.max_attempts),
            },
            partitions,
            classes,
        }
    }
}

fn build_catalog(def: &PartitionsDef) -> PartitionCatalog {
    let defaults = PartitionThresholds::default();
    let thresholds = PartitionThresholds {
        bigmem_memory_gb: def
            .thresholds
            .bigmem_memory_gb
            .unwrap_or(defaults.bigmem_memory_gb),
        quick_time_hours: def
            .thresholds
            .quick_time
            .map(duration_to_hours)
            .unwrap_or(defaults.quick_time_hours),
        quick_memory_gb: def
            .thresholds
            .quick_memory_gb
            .unwrap_or(defaults.quick_memory_gb),
    };

    let named = PartitionRole::ALL.iter().any(|role| def.role(*role).is_some());
    let mut catalog = if named {
        let mut catalog = PartitionCatalog::empty(thresholds);
        for role in PartitionRole::ALL {
            if let Some(name) = def.role(role) {
                catalog.set_partition(role, name.as_str());
            }
        }
        catalog
    } else {
        let mut catalog = PartitionCatalog::default();
        catalog.set_thresholds(thresholds);
        catalog
    };
    catalog.set_default_partition(def.default.clone());
    catalog.set_custom_options(def.custom_options.clone());
    catalog
}

fn apply_classes(
    model: &mut ResourceModel,
    classes: BTreeMap<String, ClassDef>,
) -> Result<(), ConfigError> {
    for (name, def) in classes {
        let class = JobClass::from_str(&name).map_err(|_| ConfigError::UnknownJobClass(name))?;
        let target = model.get_mut(class);
        let ClassDef {
            cpus,
            memory_gb,
            time,
            cpu_factor,
            memory_factor,
            time_factor,
            custom_options,
        } = def;
        if let Some(cpus) = cpus {
            target.base.cpus = cpus;
        }
        if let Some(memory) = memory_gb {
            target.base.memory_gb = memory;
        }
        if let Some(time) = time {
            target.base.time_hours = duration_to_hours(time);
        }
        if let Some(factor) = cpu_factor {
            target.factors.cpu = factor;
        }
        if let Some(factor) = memory_factor {
            target.factors.memory = factor;
        }
        if let Some(factor) = time_factor {
            target.factors.time = factor;
        }
        if let Some(options) = custom_options {
            target.custom_options = options;
        }
    }
    Ok(())
}

pub fn parse_config(text: &str) -> crate::Result<EngineConfig> {
    let file: ConfigFile = toml::from_str(text)?;
    Ok(file.into_engine_config()?)
}

/// Validated configuration together with the file it was read from.
#[derive(Debug)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: EngineConfig,
}

pub fn load_config_file(path: &Path) -> anyhow::Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read configuration file {}", path.display()))?;
    let config = parse_config(&text)
        .with_context(|| format!("Invalid configuration file {}", path.display()))?;
    log::debug!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Loads the configuration from `path`, or from `rightsize.toml` in the working directory.
/// Built-in defaults are used when no file is given and the default file does not exist.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        }
    };
    match path {
        Some(path) => Ok(LoadedConfig {
            config: load_config_file(&path)?,
            path: Some(path),
        }),
        None => {
            log::debug!("No configuration file found, using defaults");
            Ok(LoadedConfig {
                path: None,
                config: EngineConfig::default(),
            })
        }
    }
}
