//! Line sources: anything producing an ordered sequence of raw lines tagged
//! with a source label satisfies the parser input contract.
//!
//! The core ships file and stdin sources. Remote collaborators (Kubernetes,
//! AWS, GCP, Azure) honor the same shape externally and are deliberately
//! not implemented here.

use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;

use crate::error::{CliError, Result};

/// Registered source kinds, reported by `ptx sources`.
pub const SOURCE_KINDS: [&str; 2] = ["file", "stdin"];

/// One source's worth of raw lines.
#[derive(Debug)]
pub struct SourceLines {
    pub label: String,
    pub lines: Vec<String>,
}

/// Collect lines from the given files, or from stdin when none are given.
/// Per-source line order is preserved.
pub fn collect(files: &[PathBuf]) -> Result<Vec<SourceLines>> {
    if files.is_empty() {
        return Ok(vec![read_stdin()?]);
    }

    files
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path).map_err(|e| CliError::SourceFetch {
                path: path.clone(),
                source: e,
            })?;
            Ok(SourceLines {
                label: path.display().to_string(),
                lines: text.lines().map(str::to_string).collect(),
            })
        })
        .collect()
}

fn read_stdin() -> Result<SourceLines> {
    let mut lines = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.map_err(|e| CliError::SourceFetch {
            path: PathBuf::from("<stdin>"),
            source: e,
        })?;
        lines.push(line);
    }
    Ok(SourceLines {
        label: "stdin".to_string(),
        lines,
    })
}
