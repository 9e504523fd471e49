//! Runtime configuration (spec §6's "Configuration file" paragraph).
//!
//! The external query compiler collaborator (out of scope, §1) reads its
//! toolchain settings from a flat INI file discovered next to the
//! executable. The runtime core's only job is to parse and hold those four
//! keys so a hosting application can read them back; it never interprets
//! `cc`/`cflags`/`ldflags`/`libs` itself.

use std::collections::HashMap;
use std::path::Path;

/// The four pass-through keys named in §6. Every field is an opaque string;
/// none of them is validated beyond "present in the file".
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PipeConfig {
    pub cc: Option<String>,
    pub cflags: Option<String>,
    pub ldflags: Option<String>,
    pub libs: Option<String>,
}

impl PipeConfig {
    /// Reads the INI file at `path`. Unknown keys are ignored rather than
    /// rejected, since the file format is shared with the out-of-scope
    /// compiler collaborator and may carry settings this core never reads.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut fields = HashMap::new();
        for (lineno, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                // Section headers are accepted but ignored: the four keys
                // this core cares about are expected at top level.
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::Invalid(format!("line {}: missing '='", lineno + 1))
            })?;
            fields.insert(
                key.trim().to_ascii_lowercase(),
                unquote(value.trim()).to_string(),
            );
        }
        Ok(Self {
            cc: fields.remove("cc"),
            cflags: fields.remove("cflags"),
            ldflags: fields.remove("ldflags"),
            libs: fields.remove("libs"),
        })
    }
}

fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("input-output error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::error::PipeError {
    fn from(e: ConfigError) -> Self {
        crate::error::PipeError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_four_keys() {
        let ini = "cc = gcc\ncflags=-O2 -Wall\nldflags = -L/usr/lib\nlibs=\"-lm -lpthread\"\n";
        let cfg = PipeConfig::parse(ini).unwrap();
        assert_eq!(cfg.cc.as_deref(), Some("gcc"));
        assert_eq!(cfg.cflags.as_deref(), Some("-O2 -Wall"));
        assert_eq!(cfg.ldflags.as_deref(), Some("-L/usr/lib"));
        assert_eq!(cfg.libs.as_deref(), Some("-lm -lpthread"));
    }

    #[test]
    fn ignores_comments_blank_lines_and_sections() {
        let ini = "; a comment\n[toolchain]\n# another comment\n\ncc=clang\n";
        let cfg = PipeConfig::parse(ini).unwrap();
        assert_eq!(cfg.cc.as_deref(), Some("clang"));
    }

    #[test]
    fn missing_keys_are_none() {
        let cfg = PipeConfig::parse("cc=gcc\n").unwrap();
        assert_eq!(cfg.cflags, None);
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(PipeConfig::parse("not-a-key-value-line\n").is_err());
    }
}
