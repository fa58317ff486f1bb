use crate::domain::{ProbeError, ProbeResult};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Joins values with `separator` using the shortest round-trip float form.
pub fn join_f64(values: &[f64], separator: &str) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> ProbeResult<()> {
    ensure_parent_dir(path)?;
    fs::write(path, normalize_text_artifact(content)).map_err(|source| write_error(path, source))
}

pub fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> ProbeResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|source| {
        ProbeError::internal(
            "INTERNAL.JSON_RENDER",
            format!("failed to render '{}': {}", path.display(), source),
        )
    })?;
    write_text_artifact(path, &rendered)
}

fn ensure_parent_dir(path: &Path) -> ProbeResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| write_error(parent, source))
        }
        _ => Ok(()),
    }
}

fn write_error(path: &Path, source: std::io::Error) -> ProbeError {
    ProbeError::io_system(
        "IO.WRITE",
        format!("failed to write '{}': {}", path.display(), source),
    )
}

#[cfg(test)]
mod tests {
    use super::{join_f64, normalize_text_artifact, write_json_artifact, write_text_artifact};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn float_rows_use_shortest_representation() {
        assert_eq!(join_f64(&[0.3, 43.875, -2.0], ","), "0.3,43.875,-2");
        assert_eq!(join_f64(&[], ", "), "");
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        let normalized = normalize_text_artifact("alpha\r\nbeta\rgamma");
        assert_eq!(normalized, "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("nested/profile.csv");
        let input = "0,1\r\n0.3,2";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");

        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"0,1\n0.3,2\n");
    }

    #[test]
    fn json_artifacts_end_with_newline() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("report.json");
        write_json_artifact(&path, &serde_json::json!({ "accepted": 3 }))
            .expect("json write should succeed");

        let content = fs::read_to_string(&path).expect("report should be readable");
        assert!(content.ends_with("}\n"));
        let parsed: serde_json::Value = serde_json::from_str(&content).expect("valid json");
        assert_eq!(parsed["accepted"], 3);
    }
}
