use crate::internal::calculator::ResourceRequest;
use crate::internal::model::JobClass;
use crate::internal::partition::PartitionRole;

/// Builds the scheduler options of a submission.
///
/// The order is fixed: memory, CPUs, the bigmem constraint, the GPU resource and finally the
/// operator-supplied options exactly as configured.
pub fn build_cluster_options<'a, I>(
    class: JobClass,
    request: &ResourceRequest,
    role: Option<PartitionRole>,
    custom_options: I,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut options = vec![
        format!("--mem={:.0}G", request.memory_gb().ceil()),
        format!("--cpus-per-task={}", request.cpus()),
    ];
    if role == Some(PartitionRole::Bigmem) {
        options.push("--constraint=bigmem".to_string());
    }
    if class == JobClass::Gpu {
        options.push("--gres=gpu:1".to_string());
    }
    options.extend(custom_options.into_iter().cloned());
    options
}
