use crate::error::{HrvError, Result};
use std::path::Path;

/// Failure to read a plain-text interval file.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line} is not a number: {text}")]
    Parse { line: usize, text: String },
    #[error(transparent)]
    Empty(#[from] HrvError),
}

/// Parse newline-delimited interval values (ms), ignoring blank/comment lines.
pub fn parse_rr_ms(text: &str) -> std::result::Result<Vec<f64>, TextError> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed.parse().map_err(|_| TextError::Parse {
            line: idx + 1,
            text: trimmed.to_string(),
        })?;
        out.push(val);
    }
    ensure_samples(out.len())?;
    Ok(out)
}

/// Read a newline-delimited interval series from disk.
pub fn read_rr_ms(path: &Path) -> std::result::Result<Vec<f64>, TextError> {
    let text = std::fs::read_to_string(path).map_err(|source| TextError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_rr_ms(&text)
}

fn ensure_samples(found: usize) -> Result<()> {
    if found == 0 {
        return Err(HrvError::InsufficientData {
            context: "interval file",
            needed: 1,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let parsed = parse_rr_ms("# session\n800\n\n 812.5 \n# end\n790").unwrap();
        assert_eq!(parsed, vec![800.0, 812.5, 790.0]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_rr_ms("800\nabc\n").unwrap_err();
        assert!(matches!(err, TextError::Parse { line: 2, .. }));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(parse_rr_ms("# nothing\n"), Err(TextError::Empty(_))));
    }
}
