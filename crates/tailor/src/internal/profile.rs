use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use crate::internal::common::units::{BYTES_PER_GB, bytes_to_gb};

/// A single input file of a job, as delivered by input discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl InputFile {
    pub fn new<P: Into<PathBuf>>(path: P, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
    VeryLarge,
}

impl SizeCategory {
    pub fn from_bytes(bytes: u64) -> Self {
        match bytes / BYTES_PER_GB {
            0 => SizeCategory::Small,
            1..=9 => SizeCategory::Medium,
            10..=99 => SizeCategory::Large,
            _ => SizeCategory::VeryLarge,
        }
    }
}

impl Display for SizeCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SizeCategory::Small => "small",
            SizeCategory::Medium => "medium",
            SizeCategory::Large => "large",
            SizeCategory::VeryLarge => "very_large",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Fastq,
    Fasta,
    Unknown,
}

const COMPRESSION_EXTENSIONS: [&str; 3] = ["gz", "bz2", "xz"];
const FASTQ_EXTENSIONS: [&str; 2] = ["fastq", "fq"];
const FASTA_EXTENSIONS: [&str; 4] = ["fasta", "fa", "fna", "faa"];

/// Guesses the sequence format from the file name, looking through a compression suffix.
pub fn detect_data_type(path: &Path) -> DataType {
    let name = match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => name.to_ascii_lowercase(),
        None => return DataType::Unknown,
    };
    let mut parts = name.rsplit('.');
    let mut extension = parts.next();
    if extension.is_some_and(|ext| COMPRESSION_EXTENSIONS.contains(&ext)) {
        extension = parts.next();
    }
    // A name without any dot has no extension at all
    if !name.contains('.') {
        return DataType::Unknown;
    }
    match extension {
        Some(ext) if FASTQ_EXTENSIONS.contains(&ext) => DataType::Fastq,
        Some(ext) if FASTA_EXTENSIONS.contains(&ext) => DataType::Fasta,
        _ => DataType::Unknown,
    }
}

/// Size features of the input set of a single job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputProfile {
    total_size_bytes: u64,
    sample_count: u32,
    avg_sample_size_bytes: u64,
    size_category: SizeCategory,
    data_type: DataType,
}

impl InputProfile {
    /// Builds a profile from aggregated numbers. A zero sample count is treated as a single
    /// sample.
    pub fn from_totals(total_size_bytes: u64, sample_count: u32) -> Self {
        Self::with_data_type(total_size_bytes, sample_count, DataType::Unknown)
    }

    fn with_data_type(total_size_bytes: u64, sample_count: u32, data_type: DataType) -> Self {
        let sample_count = sample_count.max(1);
        Self {
            total_size_bytes,
            sample_count,
            avg_sample_size_bytes: total_size_bytes / sample_count as u64,
            size_category: SizeCategory::from_bytes(total_size_bytes),
            data_type,
        }
    }

    #[inline]
    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    #[inline]
    pub fn total_size_gb(&self) -> f64 {
        bytes_to_gb(self.total_size_bytes)
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    #[inline]
    pub fn avg_sample_size_bytes(&self) -> u64 {
        self.avg_sample_size_bytes
    }

    #[inline]
    pub fn size_category(&self) -> SizeCategory {
        self.size_category
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Derives the input profile of a job from its files.
///
/// An empty input list is profiled as a single sample of zero size.
pub fn profile_inputs(files: &[InputFile]) -> InputProfile {
    let total_size_bytes = files
        .iter()
        .fold(0u64, |total, file| total.saturating_add(file.size_bytes));
    let sample_count = u32::try_from(files.len()).unwrap_or(u32::MAX);

    let mut types = files.iter().map(|file| detect_data_type(&file.path));
    let data_type = match types.next() {
        Some(first) => {
            if types.all(|t| t == first) {
                first
            } else {
                DataType::Unknown
            }
        }
        None => DataType::Unknown,
    };
    InputProfile::with_data_type(total_size_bytes, sample_count, data_type)
}
