//! `<file>:<line>` source locations used as breakpoint targets.

use std::fmt;
use std::str::FromStr;

use crate::errors::ScopeError;

/// A source position as written on a debugger command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u64,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u64) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl FromStr for SourceLocation {
    type Err = ScopeError;

    /// Splits on the last colon, so the file part may itself contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScopeError::InvalidLocation(s.to_string());
        let (file, line) = s.rsplit_once(':').ok_or_else(invalid)?;
        if file.is_empty() {
            return Err(invalid());
        }
        let line: u64 = line.trim().parse().map_err(|_| invalid())?;
        if line == 0 {
            return Err(invalid());
        }
        Ok(Self::new(file, line))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_and_line() {
        let loc: SourceLocation = "test.c:10".parse().unwrap();
        assert_eq!(loc, SourceLocation::new("test.c", 10));
        assert_eq!(loc.to_string(), "test.c:10");
    }

    #[test]
    fn file_may_contain_colons() {
        let loc: SourceLocation = "C:/src/test.c:7".parse().unwrap();
        assert_eq!(loc.file, "C:/src/test.c");
        assert_eq!(loc.line, 7);
    }

    #[test]
    fn rejects_malformed_locations() {
        for bad in ["test.c", ":10", "test.c:", "test.c:0", "test.c:ten", "test.c:-3"] {
            let err = bad.parse::<SourceLocation>().unwrap_err();
            assert!(
                matches!(err, ScopeError::InvalidLocation(ref s) if s == bad),
                "{bad}: {err}"
            );
        }
    }
}
