use serde::{Deserialize, Serialize};

/// Version numbers stamped on change records.
pub type Version = i64;

/// What the checkpoint marker says about the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionState {
    /// No checkpoint and no stored nodes.
    Uninitialized,
    /// Nodes exist but nothing was ever tagged.
    Bootstrapped,
    Tagged(Version),
}

impl VersionState {
    /// The integer form: `-1`, `0`, or the tagged number.
    pub fn number(&self) -> Version {
        match self {
            Self::Uninitialized => -1,
            Self::Bootstrapped => 0,
            Self::Tagged(v) => *v,
        }
    }

    /// The version that provisional changes are stamped with.
    pub fn working(&self) -> Version {
        self.number().max(0)
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_working_versions() {
        assert_eq!(VersionState::Uninitialized.number(), -1);
        assert_eq!(VersionState::Uninitialized.working(), 0);
        assert_eq!(VersionState::Bootstrapped.number(), 0);
        assert_eq!(VersionState::Bootstrapped.working(), 0);
        assert_eq!(VersionState::Tagged(4).number(), 4);
        assert_eq!(VersionState::Tagged(4).working(), 4);
        assert!(!VersionState::Uninitialized.is_initialized());
    }
}
