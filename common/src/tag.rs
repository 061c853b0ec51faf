use std::borrow::Cow;
use std::fmt;

use serde::{Serialize, Serializer};

/// A short label attached to a packet by a marker, e.g. `mirai` or `low-mss`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(Cow<'static, str>);

impl Tag {
    pub const fn new(label: &'static str) -> Self {
        Self(Cow::Borrowed(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Tag {
    fn from(label: String) -> Self {
        Self(Cow::Owned(label))
    }
}

impl From<&'static str> for Tag {
    fn from(label: &'static str) -> Self {
        Self::new(label)
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
