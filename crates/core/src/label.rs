//! Classification labels.
//!
//! A label is a cheap-to-clone interned string. Derived labels follow the
//! `"<parent>: <child>"` convention, which is how discarded detections of a
//! group are named (`"Other: cFos"`).

use std::fmt;

use smol_str::SmolStr;

/// Parent label of every discarded-detections label.
pub const DISCARDED_PARENT: &str = "Other";

const DERIVED_DELIMITER: &str = ": ";

/// A classification assigned to a hierarchy object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(SmolStr);

impl Label {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(SmolStr::new(name.as_ref()))
    }

    /// A child label of `parent`, e.g. `Other: cFos`.
    pub fn derived(parent: &Label, child: impl AsRef<str>) -> Self {
        Self(SmolStr::new(format!(
            "{}{DERIVED_DELIMITER}{}",
            parent.0,
            child.as_ref()
        )))
    }

    /// The label given to detections a classifier rejected for group `id`.
    pub fn discarded(id: impl AsRef<str>) -> Self {
        Self::derived(&Label::new(DISCARDED_PARENT), id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parent part of a derived label.
    pub fn parent(&self) -> Option<Label> {
        self.0
            .rsplit_once(DERIVED_DELIMITER)
            .map(|(parent, _)| Label::new(parent))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Self(SmolStr::from(name))
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
