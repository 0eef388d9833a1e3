use std::fmt;

/// A resolved queue: its logical name and the broker URL it maps to.
///
/// Immutable once resolved; components take it by reference and it can be
/// shared freely between tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueRef {
    name: String,
    url: String,
}

impl QueueRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for QueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}
