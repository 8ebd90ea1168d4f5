//! The format catalog: the fixed, ordered set of container extensions the
//! conversion service understands.
//!
//! Catalog membership is the only validity gate for both the source and the
//! target format. A catalog is built once, handed to the controller through
//! [`crate::config::ControllerConfig`], and never mutated afterwards.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extensions accepted by the reference conversion service, in display order.
pub const DEFAULT_FORMATS: [&str; 10] = [
    "mp4", "mkv", "mov", "avi", "webm", "flv", "wmv", "m4v", "3gp", "ogv",
];

static DEFAULT_CATALOG: Lazy<FormatCatalog> = Lazy::new(|| {
    FormatCatalog {
        formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
    }
});

/// An immutable, ordered list of lower-case extensions.
///
/// Serialises as a plain list; deserialising goes through
/// [`FormatCatalog::new`] so entries are normalised either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FormatCatalog {
    formats: Vec<String>,
}

/// A catalog entry paired with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    pub value: String,
    pub label: String,
}

impl From<Vec<String>> for FormatCatalog {
    fn from(formats: Vec<String>) -> Self {
        Self::new(formats)
    }
}

impl From<FormatCatalog> for Vec<String> {
    fn from(catalog: FormatCatalog) -> Self {
        catalog.formats
    }
}

impl Default for FormatCatalog {
    fn default() -> Self {
        DEFAULT_CATALOG.clone()
    }
}

impl FormatCatalog {
    /// Build a catalog from arbitrary extensions.
    ///
    /// Entries are trimmed, stripped of a leading `.`, lower-cased, and
    /// deduplicated keeping the first occurrence. Empty entries are dropped.
    pub fn new<I, S>(formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for f in formats {
            let f = normalise(f.as_ref());
            if !f.is_empty() && !out.contains(&f) {
                out.push(f);
            }
        }
        Self { formats: out }
    }

    /// Whether `format` (any case, optional leading dot) is in the catalog.
    pub fn contains(&self, format: &str) -> bool {
        let f = normalise(format);
        self.formats.iter().any(|known| *known == f)
    }

    /// Look up `format` and return the catalog's canonical spelling.
    pub fn resolve(&self, format: &str) -> Option<&str> {
        let f = normalise(format);
        self.formats
            .iter()
            .find(|known| **known == f)
            .map(String::as_str)
    }

    /// Exact lookup of an already case-folded extension. No trimming and no
    /// dot stripping: `" mkv "` is not `mkv`.
    pub fn get(&self, extension: &str) -> Option<&str> {
        self.formats
            .iter()
            .find(|known| *known == extension)
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Value/label pairs for a format picker, labels upper-cased.
    pub fn options(&self) -> Vec<FormatOption> {
        self.formats
            .iter()
            .map(|f| FormatOption {
                value: f.clone(),
                label: f.to_uppercase(),
            })
            .collect()
    }

    /// Short summary showing the first `shown` labels and a count of the rest,
    /// e.g. `MP4 MKV MOV AVI WEBM +5 more`.
    pub fn preview(&self, shown: usize) -> String {
        let mut parts: Vec<String> = self
            .formats
            .iter()
            .take(shown)
            .map(|f| f.to_uppercase())
            .collect();
        let rest = self.formats.len().saturating_sub(shown);
        if rest > 0 {
            parts.push(format!("+{rest} more"));
        }
        parts.join(" ")
    }
}

impl fmt::Display for FormatCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.formats.iter().map(|x| x.to_uppercase()).collect();
        write!(f, "{}", labels.join(", "))
    }
}

fn normalise(format: &str) -> String {
    format.trim().trim_start_matches('.').to_lowercase()
}
