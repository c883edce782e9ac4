//! Source-range metadata attached to features.
//!
//! A feature can carry any number of source ranges recording where in a
//! codebase the feature's implementation lives, optionally scoped to a
//! revision range of the repository.

use std::path::{Path, PathBuf};

use smol_str::SmolStr;

use super::Location;

/// Whether a source range is essential to the feature it annotates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RangeCategory {
    #[default]
    Necessary,
    Inessential,
}

/// The revision span over which a source range is valid: the commit that
/// introduced it and, if it has since disappeared, the commit that removed
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureRevisionRange {
    introduced: SmolStr,
    removed: Option<SmolStr>,
}

impl FeatureRevisionRange {
    pub fn new(introduced: impl Into<SmolStr>) -> Self {
        Self {
            introduced: introduced.into(),
            removed: None,
        }
    }

    pub fn with_removal(introduced: impl Into<SmolStr>, removed: impl Into<SmolStr>) -> Self {
        Self {
            introduced: introduced.into(),
            removed: Some(removed.into()),
        }
    }

    pub fn introducing_commit(&self) -> &str {
        &self.introduced
    }

    pub fn removing_commit(&self) -> Option<&str> {
        self.removed.as_deref()
    }
}

/// A source range `(path, start?, end?)` with a [`RangeCategory`] and an
/// optional [`FeatureRevisionRange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureSourceRange {
    path: PathBuf,
    start: Option<Location>,
    end: Option<Location>,
    category: RangeCategory,
    revision_range: Option<FeatureRevisionRange>,
}

impl FeatureSourceRange {
    pub fn new(path: impl Into<PathBuf>, start: Option<Location>, end: Option<Location>) -> Self {
        Self {
            path: path.into(),
            start,
            end,
            category: RangeCategory::default(),
            revision_range: None,
        }
    }

    pub fn with_category(mut self, category: RangeCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_revision_range(mut self, revision_range: FeatureRevisionRange) -> Self {
        self.revision_range = Some(revision_range);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn start(&self) -> Option<Location> {
        self.start
    }

    pub fn end(&self) -> Option<Location> {
        self.end
    }

    pub fn category(&self) -> RangeCategory {
        self.category
    }

    pub fn revision_range(&self) -> Option<&FeatureRevisionRange> {
        self.revision_range.as_ref()
    }
}

impl std::fmt::Display for FeatureSourceRange {
    /// Renders as `path`, `path:start`, or `path:start-end`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(start) = &self.start {
            write!(f, ":{start}")?;
        }
        if let Some(end) = &self.end {
            write!(f, "-{end}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_full_range() {
        let fsr = FeatureSourceRange::new(
            "src/main.c",
            Some(Location::new(3, 4)),
            Some(Location::new(3, 20)),
        );
        assert_eq!(fsr.to_string(), "src/main.c:3:4-3:20");
    }

    #[test]
    fn test_display_path_only() {
        let fsr = FeatureSourceRange::new("src/main.c", None, None);
        assert_eq!(fsr.to_string(), "src/main.c");
    }

    #[test]
    fn test_equality_covers_revision_range() {
        let plain = FeatureSourceRange::new("a.c", None, None);
        let scoped = FeatureSourceRange::new("a.c", None, None)
            .with_revision_range(FeatureRevisionRange::new("abc123"));
        assert_ne!(plain, scoped);
        assert_eq!(plain, plain.clone());
    }
}
