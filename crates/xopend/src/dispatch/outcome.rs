//! Explicit handler results.

/// Result of executing a verb.
///
/// A failure is distinct from a successful empty reply so that a memoised
/// failure can be told apart from a legitimately empty body. Both encode as
/// their bytes on the wire, which keeps the protocol compatible with clients
/// that only look for an empty response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The handler produced a reply.
    Success(Vec<u8>),
    /// The handler failed or the verb is unsupported.
    Failure,
}

impl Outcome {
    /// Successful reply with no body.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Success(Vec::new())
    }

    /// Returns true for [`Outcome::Failure`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Bytes written back to the client.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Success(body) => body,
            Self::Failure => &[],
        }
    }
}

impl From<Vec<u8>> for Outcome {
    fn from(body: Vec<u8>) -> Self {
        Self::Success(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_and_empty_success_share_wire_bytes() {
        assert_eq!(Outcome::Failure.as_bytes(), Outcome::empty().as_bytes());
        assert_ne!(Outcome::Failure, Outcome::empty());
    }
}
