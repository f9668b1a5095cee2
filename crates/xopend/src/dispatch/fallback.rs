//! Handling for verbs outside the daemon's own vocabulary.

use tracing::debug;

use super::DISPATCH_TARGET;
use super::outcome::Outcome;

/// Capability consulted for verbs the daemon does not recognise.
pub trait Fallback: Send + Sync {
    /// Produces the outcome for an unrecognised `verb`.
    fn execute(&self, verb: &[u8], payload: &[u8]) -> Outcome;
}

/// Fallback that rejects every unknown verb with an empty response.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFallback;

impl Fallback for NoFallback {
    fn execute(&self, verb: &[u8], _payload: &[u8]) -> Outcome {
        debug!(
            target: DISPATCH_TARGET,
            verb = %String::from_utf8_lossy(verb),
            "unknown verb"
        );
        Outcome::Failure
    }
}
