use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use crate::internal::calculator::ResourceRequest;
use crate::internal::common::error::PartitionUnavailable;
use crate::internal::model::JobClass;
use crate::internal::partition::options::build_cluster_options;
use crate::internal::partition::{PartitionCatalog, PartitionRole, PartitionThresholds};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Choose the partition from the shape of the request and the job class.
    #[default]
    #[serde(rename = "intelligent")]
    Intelligent,
    /// Always use the default partition.
    #[serde(rename = "static")]
    Static,
    /// Use the partition given explicitly for each job.
    #[serde(rename = "user-defined", alias = "user_defined")]
    UserDefined,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Intelligent => "intelligent",
            StrategyKind::Static => "static",
            StrategyKind::UserDefined => "user-defined",
        }
    }

    pub fn build(self) -> Box<dyn PartitionStrategy> {
        match self {
            StrategyKind::Intelligent => Box::new(IntelligentStrategy),
            StrategyKind::Static => Box::new(StaticStrategy),
            StrategyKind::UserDefined => Box::new(UserDefinedStrategy),
        }
    }
}

impl Display for StrategyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "intelligent" => Ok(StrategyKind::Intelligent),
            "static" => Ok(StrategyKind::Static),
            "user-defined" => Ok(StrategyKind::UserDefined),
            _ => Err(format!(
                "unknown partition strategy `{s}`, expected one of intelligent, static, user-defined"
            )),
        }
    }
}

/// Where a strategy wants to place a job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionTarget {
    /// A logical role, resolved through the catalog and its fallback chain.
    Role(PartitionRole),
    /// A concrete partition name that is known to be in the catalog.
    Named(String),
}

/// Non-fatal events of a partition selection that an operator should know about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionWarning {
    Fallback {
        from: PartitionRole,
        to: PartitionRole,
    },
    MissingUserPartition,
}

impl Display for SelectionWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionWarning::Fallback { from, to } => write!(
                f,
                "partition role `{from}` is not configured, falling back to `{to}`"
            ),
            SelectionWarning::MissingUserPartition => f.write_str(
                "no partition was given for a user-defined selection, choosing one from the request",
            ),
        }
    }
}

pub trait PartitionStrategy: Send + Sync + Debug {
    fn kind(&self) -> StrategyKind;

    fn target(
        &self,
        class: JobClass,
        request: &ResourceRequest,
        user_partition: Option<&str>,
        catalog: &PartitionCatalog,
        warnings: &mut Vec<SelectionWarning>,
    ) -> Result<PartitionTarget, PartitionUnavailable>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntelligentStrategy;

impl IntelligentStrategy {
    /// Ordered rules; the first one that matches wins.
    pub fn role_for(
        class: JobClass,
        request: &ResourceRequest,
        thresholds: &PartitionThresholds,
    ) -> PartitionRole {
        if request.memory_gb() > thresholds.bigmem_memory_gb || class == JobClass::MemoryIntensive
        {
            PartitionRole::Bigmem
        } else if class == JobClass::Gpu {
            PartitionRole::Gpu
        } else if matches!(class, JobClass::Quick | JobClass::Low)
            && request.time_hours() <= thresholds.quick_time_hours
            && request.memory_gb() <= thresholds.quick_memory_gb
        {
            PartitionRole::Quick
        } else {
            PartitionRole::Compute
        }
    }
}

impl PartitionStrategy for IntelligentStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Intelligent
    }

    fn target(
        &self,
        class: JobClass,
        request: &ResourceRequest,
        _user_partition: Option<&str>,
        catalog: &PartitionCatalog,
        _warnings: &mut Vec<SelectionWarning>,
    ) -> Result<PartitionTarget, PartitionUnavailable> {
        Ok(PartitionTarget::Role(Self::role_for(
            class,
            request,
            catalog.thresholds(),
        )))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StaticStrategy;

impl PartitionStrategy for StaticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Static
    }

    fn target(
        &self,
        _class: JobClass,
        _request: &ResourceRequest,
        _user_partition: Option<&str>,
        catalog: &PartitionCatalog,
        _warnings: &mut Vec<SelectionWarning>,
    ) -> Result<PartitionTarget, PartitionUnavailable> {
        catalog
            .default_partition()
            .map(|name| PartitionTarget::Named(name.to_string()))
            .ok_or(PartitionUnavailable::NoFallback(PartitionRole::Compute))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UserDefinedStrategy;

impl PartitionStrategy for UserDefinedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::UserDefined
    }

    fn target(
        &self,
        class: JobClass,
        request: &ResourceRequest,
        user_partition: Option<&str>,
        catalog: &PartitionCatalog,
        warnings: &mut Vec<SelectionWarning>,
    ) -> Result<PartitionTarget, PartitionUnavailable> {
        match user_partition {
            Some(name) if catalog.role_of(name).is_some() => {
                Ok(PartitionTarget::Named(name.to_string()))
            }
            Some(name) => Err(PartitionUnavailable::NotInCatalog(name.to_string())),
            None => {
                warnings.push(SelectionWarning::MissingUserPartition);
                IntelligentStrategy.target(class, request, None, catalog, warnings)
            }
        }
    }
}

/// Result of a partition selection.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionChoice {
    pub partition: String,
    /// Role of the selected partition, if it is known to the catalog.
    pub role: Option<PartitionRole>,
    pub cluster_options: Vec<String>,
    pub warnings: Vec<SelectionWarning>,
}

/// Resolves a role through the fallback chain. At most one warning is emitted, naming the
/// original role and the role that was used instead.
fn resolve_role(
    role: PartitionRole,
    catalog: &PartitionCatalog,
    warnings: &mut Vec<SelectionWarning>,
) -> Result<(String, PartitionRole), PartitionUnavailable> {
    let mut current = role;
    loop {
        if let Some(name) = catalog.get(current) {
            if current != role {
                warnings.push(SelectionWarning::Fallback {
                    from: role,
                    to: current,
                });
            }
            return Ok((name.to_string(), current));
        }
        match current.fallback() {
            Some(next) => current = next,
            None => return Err(PartitionUnavailable::NoFallback(role)),
        }
    }
}

/// Selects the partition of a single submission and builds its scheduler options.
///
/// `class_options` are the operator options of the job class; they follow the catalog-wide
/// options.
pub fn select_partition(
    strategy: &dyn PartitionStrategy,
    class: JobClass,
    request: &ResourceRequest,
    user_partition: Option<&str>,
    catalog: &PartitionCatalog,
    class_options: &[String],
) -> Result<PartitionChoice, PartitionUnavailable> {
    let mut warnings = Vec::new();
    let (partition, role) =
        match strategy.target(class, request, user_partition, catalog, &mut warnings)? {
            PartitionTarget::Role(role) => {
                let (name, role) = resolve_role(role, catalog, &mut warnings)?;
                (name, Some(role))
            }
            PartitionTarget::Named(name) => {
                let role = catalog.role_of(&name);
                (name, role)
            }
        };
    let cluster_options = build_cluster_options(
        class,
        request,
        role,
        catalog.custom_options().iter().chain(class_options),
    );
    log::debug!(
        "Selected partition {partition} for class {class} using {} strategy",
        strategy.kind()
    );
    Ok(PartitionChoice {
        partition,
        role,
        cluster_options,
        warnings,
    })
}
