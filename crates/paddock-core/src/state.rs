//! Machine state reported by providers.

use std::fmt;

/// Immutable status value reported by a provider.
///
/// A state is constructed fresh on every query and carries no identity
/// beyond its fields: an `id` token for programmatic checks plus a short
/// and a long human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    id: String,
    short_description: String,
    long_description: String,
}

impl MachineState {
    /// Token for a machine that has never been created.
    pub const NOT_CREATED: &'static str = "not_created";
    /// Token for a running machine.
    pub const RUNNING: &'static str = "running";
    /// Token for a stopped machine.
    pub const STOPPED: &'static str = "stopped";
    /// Token for a machine whose state cannot be determined.
    pub const UNKNOWN: &'static str = "unknown";

    /// Creates a new state value.
    pub fn new(
        id: impl Into<String>,
        short_description: impl Into<String>,
        long_description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            short_description: short_description.into(),
            long_description: long_description.into(),
        }
    }

    /// The state token.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// One-line description for listings.
    #[must_use]
    pub fn short_description(&self) -> &str {
        &self.short_description
    }

    /// Full description for detailed output.
    #[must_use]
    pub fn long_description(&self) -> &str {
        &self.long_description
    }

    /// Whether the state conforms to the required shape.
    ///
    /// A state without an `id` token indicates a provider defect.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_its_fields() {
        let state = MachineState::new(MachineState::RUNNING, "running", "The machine is running.");
        assert_eq!(state.id(), "running");
        assert_eq!(state.short_description(), "running");
        assert_eq!(state.long_description(), "The machine is running.");
        assert!(state.is_valid());
    }

    #[test]
    fn empty_token_is_invalid() {
        let state = MachineState::new("", "?", "?");
        assert!(!state.is_valid());
    }
}
