use std::io::BufRead;
use std::path::Path;

use anyhow::Context;

use tailor::observation::UsageObservation;

/// Reads a JSON lines observation log. Blank lines and lines starting with `#` are skipped.
pub fn parse_observations<R: BufRead>(reader: R) -> anyhow::Result<Vec<UsageObservation>> {
    let mut observations = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let observation: UsageObservation = serde_json::from_str(line)
            .with_context(|| format!("Invalid observation on line {}", index + 1))?;
        observations.push(observation);
    }
    Ok(observations)
}

pub fn load_observations(path: &Path) -> anyhow::Result<Vec<UsageObservation>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open observation log {}", path.display()))?;
    let observations = parse_observations(std::io::BufReader::new(file))
        .with_context(|| format!("Cannot read observation log {}", path.display()))?;
    log::debug!(
        "Loaded {} observation(s) from {}",
        observations.len(),
        path.display()
    );
    Ok(observations)
}
