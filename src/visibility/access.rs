use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-element access level, declared through the platform `access` profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessLevel {
    Private,
    Protected,
    Public,
    Externalizable,
}

impl AccessLevel {
    pub fn from_stereotype(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Self::Private),
            "protected" => Some(Self::Protected),
            "public" => Some(Self::Public),
            "externalizable" => Some(Self::Externalizable),
            _ => None,
        }
    }

    /// Whether an element with this level, declared in `owner_package`, can
    /// be referenced from `from_package`.
    pub fn permits(&self, owner_package: &str, from_package: &str) -> bool {
        match self {
            Self::Private => owner_package == from_package,
            Self::Protected => {
                owner_package == from_package
                    || from_package
                        .strip_prefix(owner_package)
                        .map_or(false, |rest| rest.starts_with("::"))
            }
            Self::Public | Self::Externalizable => true,
        }
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        Self::Public
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Public => "public",
            Self::Externalizable => "externalizable",
        };
        f.write_str(name)
    }
}
