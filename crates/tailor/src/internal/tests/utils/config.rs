use derive_builder::Builder;

use crate::internal::config::{Ceilings, EngineConfig};
use crate::internal::engine::AllocationEngine;
use crate::internal::model::ResourceModel;
use crate::internal::partition::strategy::StrategyKind;
use crate::internal::partition::{PartitionCatalog, PartitionRole, PartitionThresholds};

/// Engine configuration used by the tests. Partitions are named after their role.
#[derive(Builder)]
#[builder(pattern = "owned", build_fn(name = "finish"))]
pub struct TestConfig {
    #[builder(default = "32")]
    max_cpus: u32,
    #[builder(default = "1000.0")]
    max_memory_gb: f64,
    #[builder(default = "72.0")]
    max_time_hours: f64,
    #[builder(default = "3")]
    max_attempts: u32,
    #[builder(default)]
    strategy: StrategyKind,
    #[builder(default = "PartitionRole::ALL.to_vec()")]
    roles: Vec<PartitionRole>,
    #[builder(default, setter(into, strip_option))]
    default_partition: Option<String>,
    #[builder(default)]
    custom_options: Vec<String>,
    #[builder(default)]
    model: ResourceModel,
}

impl TestConfigBuilder {
    pub fn build(self) -> EngineConfig {
        let TestConfig {
            max_cpus,
            max_memory_gb,
            max_time_hours,
            max_attempts,
            strategy,
            roles,
            default_partition,
            custom_options,
            model,
        } = self.finish().unwrap();

        let mut catalog = PartitionCatalog::empty(PartitionThresholds::default());
        for role in roles {
            catalog.set_partition(role, role.name());
        }
        catalog.set_default_partition(default_partition);
        catalog.set_custom_options(custom_options);

        EngineConfig {
            model,
            ceilings: Ceilings {
                max_cpus,
                max_memory_gb,
                max_time_hours,
            },
            catalog,
            strategy,
            max_attempts,
        }
    }

    pub fn engine(self) -> AllocationEngine {
        AllocationEngine::new(self.build()).unwrap()
    }
}

pub fn test_engine() -> AllocationEngine {
    TestConfigBuilder::default().engine()
}
