use thiserror::Error;

/// A malformed or disallowed assistant turn.
///
/// The rendered text is echoed back to the model as a retry instruction, so it
/// always names where the problem is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {reason}")]
pub struct ProtocolError {
    pub location: String,
    pub reason: String,
}

impl ProtocolError {
    pub fn new(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn at_step(index: usize, field: &str, reason: impl Into<String>) -> Self {
        let location = if field.is_empty() {
            format!("steps[{index}]")
        } else {
            format!("steps[{index}].{field}")
        };
        Self::new(location, reason)
    }
}
