use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

pub fn artifacts_dir(base: &Path, scenario: &str, seed: u64, actor: &str) -> PathBuf {
    let ts = Utc::now().format("%Y%m%dT%H%M%S%3f");
    let slug = scenario.to_lowercase().replace(' ', "-");
    base.join(slug)
        .join(format!("seed-{seed}"))
        .join(actor)
        .join(ts.to_string())
}

/// Dump a failed run: the full summary as JSON plus the failure line.
pub fn write_failure_artifacts(
    dir: &Path,
    summary: &serde_json::Value,
    failure: &str,
) -> Result<()> {
    fs::create_dir_all(dir).context("creating artifacts dir")?;

    let payload = serde_json::to_vec_pretty(summary).unwrap_or_default();
    let _ = fs::write(dir.join("summary.json"), payload);
    let _ = fs::write(dir.join("error.txt"), failure);

    Ok(())
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse seed tokens; decimal or `0x`-prefixed hexadecimal.
pub fn parse_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    tokens
        .iter()
        .map(|token| {
            let parsed = match token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
            {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => token.parse(),
            };
            parsed.with_context(|| format!("invalid seed '{token}'"))
        })
        .collect()
}
