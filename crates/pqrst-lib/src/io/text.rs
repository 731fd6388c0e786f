use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;

/// Parse one value per line, ignoring blank and `#` comment lines.
fn parse_lines<T>(text: &str, what: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val = trimmed
            .parse::<T>()
            .with_context(|| format!("line {} is not {}: {}", idx + 1, what, trimmed))?;
        out.push(val);
    }
    Ok(out)
}

/// Parse a newline-delimited amplitude series. At least one sample is required.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let out = parse_lines::<f64>(text, "a number")?;
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited amplitude series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Parse newline-delimited R-peak sample indices. An empty list is valid.
pub fn parse_peak_indices(text: &str) -> Result<Vec<usize>> {
    parse_lines::<usize>(text, "an integer index")
}

/// Read R-peak indices from a file.
pub fn read_peak_indices(path: &Path) -> Result<Vec<usize>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_peak_indices(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let series = parse_f64_series("# lead I\n0.5\n\n-1.25\n  2\n").expect("parse");
        assert_eq!(series, vec![0.5, -1.25, 2.0]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_f64_series("1.0\nabc\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_series_is_rejected_but_empty_peaks_are_not() {
        assert!(parse_f64_series("# nothing\n").is_err());
        assert!(parse_peak_indices("# nothing\n").expect("peaks").is_empty());
        assert_eq!(parse_peak_indices("10\n20\n").expect("peaks"), vec![10, 20]);
    }
}
