//! Path-pattern seam for watcher filters.
//!
//! Watchers only ever ask two questions of a filter: does a path match, and
//! what is the literal (wildcard-free) prefix to scan and arm on. Both are
//! behind [`PathPattern`] so the matching algorithm itself stays an external
//! collaborator; [`GlobPattern`] is the stock implementation.

use glob::{MatchOptions, Pattern};

/// Pattern queries a watcher needs from its filter.
pub trait PathPattern: Send + Sync {
    /// Whether `path` matches the filter.
    fn matches(&self, path: &str) -> bool;

    /// The filter's literal prefix: the deepest wildcard-free directory,
    /// used as the scan root and the change-signal root.
    fn literal_prefix(&self) -> &str;
}

/// Characters that make a filter a pattern rather than a literal path.
const WILDCARDS: [char; 3] = ['*', '?', '['];

/// Whether a filter string contains glob wildcards.
pub fn has_wildcard(filter: &str) -> bool {
    filter.contains(WILDCARDS)
}

/// Glob-based [`PathPattern`] implementation.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: Pattern,
    prefix: String,
}

impl GlobPattern {
    /// Compile a glob filter.
    ///
    /// # Arguments
    /// * `filter` - Glob expression, e.g. `logs/**/*.txt`
    ///
    /// # Errors
    /// Returns the glob crate's error for malformed patterns.
    pub fn new(filter: &str) -> Result<Self, glob::PatternError> {
        Ok(Self {
            pattern: Pattern::new(filter)?,
            prefix: literal_prefix_of(filter).to_string(),
        })
    }

    /// The raw glob expression.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl PathPattern for GlobPattern {
    fn matches(&self, path: &str) -> bool {
        // `*` and `?` must not cross separators; `**` still recurses.
        let options: MatchOptions = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.pattern.matches_with(path, options)
    }

    fn literal_prefix(&self) -> &str {
        &self.prefix
    }
}

/// Literal prefix of a filter: everything up to the last separator before
/// the first wildcard. `logs/**/*.txt` -> `logs`, `*.txt` -> ``.
fn literal_prefix_of(filter: &str) -> &str {
    let wildcard_pos: usize = match filter.find(WILDCARDS) {
        Some(pos) => pos,
        None => filter.len(),
    };
    match filter[..wildcard_pos].rfind('/') {
        Some(pos) => &filter[..pos],
        None => "",
    }
}
