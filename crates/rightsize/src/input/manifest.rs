use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Deserializer};

use tailor::{JobSpec, Set};
use tailor::model::{BaseResources, JobClass};

use crate::common::parser::parse_size;
use crate::common::utils::time::{duration_to_hours, parse_hms_or_human_time};
use crate::input::discovery::resolve_input;

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Bytes(u64),
    Text(String),
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<SizeValue>::deserialize(deserializer)? {
        Some(SizeValue::Bytes(size)) => Ok(Some(size)),
        Some(SizeValue::Text(text)) => parse_size(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_job_class<'de, D>(deserializer: D) -> Result<JobClass, D::Error>
where
    D: Deserializer<'de>,
{
    let buf = String::deserialize(deserializer)?;
    JobClass::from_str(&buf).map_err(serde::de::Error::custom)
}

fn deserialize_human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let buf = String::deserialize(deserializer)?;
    parse_hms_or_human_time(&buf).map_err(serde::de::Error::custom)
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InputDef {
    pub path: PathBuf,
    /// Size in bytes, or with a unit suffix. The file is stat-ed when missing.
    #[serde(default, deserialize_with = "deserialize_size_opt")]
    pub size: Option<u64>,
}

/// Replaces the base resources of the job class for a single job.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BaseDef {
    pub cpus: u32,
    pub memory_gb: f64,
    #[serde(deserialize_with = "deserialize_human_duration")]
    pub time: Duration,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JobDef {
    pub id: String,
    #[serde(deserialize_with = "deserialize_job_class")]
    pub class: JobClass,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
    #[serde(default)]
    pub base: Option<BaseDef>,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub jobs: Vec<JobDef>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Toml,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Ok(ManifestFormat::Json),
            Some("toml") => Ok(ManifestFormat::Toml),
            _ => bail!(
                "Cannot detect the format of manifest {}, use a .json or .toml extension",
                path.display()
            ),
        }
    }
}

pub fn parse_manifest(text: &str, format: ManifestFormat) -> crate::Result<Manifest> {
    Ok(match format {
        ManifestFormat::Json => serde_json::from_str(text)?,
        ManifestFormat::Toml => toml::from_str(text)?,
    })
}

impl Manifest {
    /// Turns the manifest into engine jobs. Relative input paths are resolved against
    /// `base_dir` and inputs without a declared size are looked up on disk.
    pub fn into_job_specs(self, base_dir: &Path) -> anyhow::Result<Vec<JobSpec>> {
        let mut seen = Set::default();
        let mut specs = Vec::with_capacity(self.jobs.len());
        for job in self.jobs {
            if !seen.insert(job.id.clone()) {
                bail!("Job `{}` is defined more than once", job.id);
            }
            let mut inputs = Vec::with_capacity(job.inputs.len());
            for input in job.inputs {
                let path = base_dir.join(&input.path);
                let files = resolve_input(path, input.size).with_context(|| {
                    format!(
                        "Cannot read input {} of job `{}`",
                        input.path.display(),
                        job.id
                    )
                })?;
                inputs.extend(files);
            }
            let mut spec = JobSpec::new(job.id, job.class, inputs);
            spec.partition = job.partition;
            spec.base_override = job.base.map(|base| {
                BaseResources::new(base.cpus, base.memory_gb, duration_to_hours(base.time))
            });
            specs.push(spec);
        }
        Ok(specs)
    }
}

/// Reads a manifest and resolves its inputs relative to the manifest directory.
pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<JobSpec>> {
    let format = ManifestFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read manifest {}", path.display()))?;
    let manifest = parse_manifest(&text, format)
        .with_context(|| format!("Invalid manifest {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    manifest.into_job_specs(base_dir)
}
