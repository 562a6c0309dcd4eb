//! Exact module versions the proxy no longer serves

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::ConfigError;

/// Immutable set of `module@version` strings loaded once at startup.
///
/// These versions appear in the module index but cannot be downloaded from the
/// proxy, so fetching them would only fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRemoved {
    entries: HashSet<String>,
}

impl ProxyRemoved {
    /// Build the set from lines of `module@version`; whitespace is trimmed and
    /// blank lines are ignored.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self { entries }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_lines(lines))
    }

    /// Read the list from `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_error)?;
        let removed = Self::from_reader(BufReader::new(file)).map_err(io_error)?;

        info!(
            "Read {} excluded module versions from {:?}",
            removed.len(),
            path
        );
        Ok(removed)
    }

    /// Exact match on `module_path@version`
    pub fn contains(&self, module_path: &str, version: &str) -> bool {
        self.entries.contains(&format!("{module_path}@{version}"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
