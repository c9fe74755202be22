use serde::{Deserialize, Serialize};
use std::path::Path;

/// Role a file plays in a C/C++ build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    /// Compiled translation unit (`.cpp`, `.cc`, ...)
    Source,
    /// Included header (`.h`, `.hpp`, ...)
    Header,
    Other,
}

/// Recognized source and header extensions (lowercase, without the dot)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extensions {
    pub source: Vec<String>,
    pub header: Vec<String>,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            source: ["cpp", "c", "cc", "cxx"].map(String::from).to_vec(),
            header: ["h", "hpp", "hh", "hxx"].map(String::from).to_vec(),
        }
    }
}

impl Extensions {
    /// Detect the role of a file from its extension
    pub fn role_of(&self, path: impl AsRef<Path>) -> FileRole {
        let Some(ext) = path.as_ref().extension().and_then(|e| e.to_str()) else {
            return FileRole::Other;
        };
        let ext = ext.to_lowercase();
        if self.source.iter().any(|s| s.eq_ignore_ascii_case(&ext)) {
            FileRole::Source
        } else if self.header.iter().any(|h| h.eq_ignore_ascii_case(&ext)) {
            FileRole::Header
        } else {
            FileRole::Other
        }
    }

    pub fn is_source(&self, path: impl AsRef<Path>) -> bool {
        self.role_of(path) == FileRole::Source
    }

    pub fn is_header(&self, path: impl AsRef<Path>) -> bool {
        self.role_of(path) == FileRole::Header
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.source.is_empty() {
            return Err("at least one source extension is required".to_string());
        }
        for ext in self.source.iter().chain(&self.header) {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(format!(
                    "extension {ext:?} must be non-empty and given without the leading dot"
                ));
            }
        }
        if let Some(shared) = self.source.iter().find(|s| self.header.contains(s)) {
            return Err(format!("extension {shared:?} is both a source and a header extension"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_roles_case_insensitively() {
        let ext = Extensions::default();
        assert_eq!(ext.role_of("src/Actions.cpp"), FileRole::Source);
        assert_eq!(ext.role_of("src/Actions.CXX"), FileRole::Source);
        assert_eq!(ext.role_of("include/Entities.hpp"), FileRole::Header);
        assert_eq!(ext.role_of("Makefile"), FileRole::Other);
        assert_eq!(ext.role_of("notes.txt"), FileRole::Other);
    }

    #[test]
    fn default_extensions_are_valid() {
        assert!(Extensions::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_overlap_and_dots() {
        let overlapping = Extensions {
            source: vec!["cpp".into(), "h".into()],
            header: vec!["h".into()],
        };
        assert!(overlapping.validate().is_err());

        let dotted = Extensions {
            source: vec![".cpp".into()],
            header: vec![],
        };
        assert!(dotted.validate().is_err());
    }
}
