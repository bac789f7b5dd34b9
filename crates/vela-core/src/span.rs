//! Source location tracking for diagnostics.

use std::fmt;
use std::sync::Arc;

/// A source file being compiled.
///
/// Shared by every token and IR node produced from it; positions only hold a
/// handle, never the text.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
}

impl SourceFile {
    /// Create a shared handle for a file name.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }

    /// The file name as given to the compiler.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A range of source text: the file plus start and end positions.
///
/// Lines and columns are 1-indexed. Ranges are informational; they flow into
/// diagnostics and are never used to re-read the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub file: Arc<SourceFile>,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceRange {
    /// Create a range covering `start_line:start_col` through `end_line:end_col`.
    pub fn new(
        file: Arc<SourceFile>,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    ) -> Self {
        Self {
            file,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create an empty range at a single position.
    pub fn point(file: Arc<SourceFile>, line: u32, col: u32) -> Self {
        Self::new(file, line, col, line, col)
    }

    /// Extend this range to the end of `other`.
    pub fn to(&self, other: &SourceRange) -> SourceRange {
        SourceRange {
            file: Arc::clone(&self.file),
            start_line: self.start_line,
            start_col: self.start_col,
            end_line: other.end_line,
            end_col: other.end_col,
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.name(), self.start_line, self.start_col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_start_position() {
        let file = SourceFile::new("demo.vela");
        let range = SourceRange::new(file, 3, 7, 3, 12);
        assert_eq!(format!("{range}"), "demo.vela:3:7");
    }

    #[test]
    fn to_extends_through_other() {
        let file = SourceFile::new("demo.vela");
        let a = SourceRange::new(Arc::clone(&file), 1, 1, 1, 4);
        let b = SourceRange::new(file, 2, 1, 2, 9);
        let merged = a.to(&b);
        assert_eq!(merged.start_line, 1);
        assert_eq!(merged.start_col, 1);
        assert_eq!(merged.end_line, 2);
        assert_eq!(merged.end_col, 9);
    }

    #[test]
    fn point_is_empty() {
        let file = SourceFile::new("demo.vela");
        let p = SourceRange::point(file, 5, 2);
        assert_eq!(p.start_line, p.end_line);
        assert_eq!(p.start_col, p.end_col);
    }
}
