/// Result of a mutating command: the resulting state plus whether this call
/// performed the transition or found it already in effect.
///
/// Every command is safe to retry after a network timeout: a retry whose
/// effect already landed returns the current state with `applied = false`
/// instead of producing a second side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub applied: bool,
}

impl<T> Outcome<T> {
    /// The call performed the transition.
    pub fn applied(value: T) -> Self {
        Self {
            value,
            applied: true,
        }
    }

    /// The transition had already been applied by an earlier call.
    pub fn already(value: T) -> Self {
        Self {
            value,
            applied: false,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            applied: self.applied,
        }
    }
}
