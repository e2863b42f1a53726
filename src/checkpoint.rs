//! Durable checkpointing (§6 "Suspension object", §9 "Checkpointing"): turns
//! a paused [`Suspension`] into bytes that can be written to a store,
//! shipped across a process boundary, and later turned back into a
//! resumable [`Suspension`].
//!
//! Grounded directly on the teacher crate's `Runner::dump`/`Runner::load`
//! pair (`run.rs`): the same `postcard::to_allocvec`/`postcard::from_bytes`
//! round trip, just over this engine's own serialisable unit. A
//! [`Suspension`] is a faithful fit for that role precisely because
//! everything it can reach — [`Value`], [`Continuation`] — already derives
//! `Serialize`/`Deserialize` (value.rs), with the two genuinely
//! unpersistable variants (`Value::Iter`, `Value::ContextManager`) marked
//! `#[serde(skip)]` and reconstructed as their defaults on load, exactly as
//! the teacher crate's own heap handles objects it cannot round-trip
//! (native-resource proxies excluded from its `Heap<T>` serialisation).

use std::fmt;

use crate::suspension::Suspension;

/// Failure of either half of the round trip. Kept distinct from
/// [`postcard::Error`] alone so a caller can tell which direction failed
/// without inspecting the error's `Display` text.
#[derive(Debug)]
pub enum CheckpointError {
    Encode(postcard::Error),
    Decode(postcard::Error),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "failed to encode checkpoint: {e}"),
            Self::Decode(e) => write!(f, "failed to decode checkpoint: {e}"),
        }
    }
}

impl std::error::Error for CheckpointError {}

/// Serializes a paused [`Suspension`] to its durable byte form.
///
/// # Errors
/// Returns [`CheckpointError::Encode`] if `postcard` cannot serialize the
/// suspension (only possible if a registered external's own argument or
/// return value carries something outside the dialect's [`Value`] type,
/// which should never happen against output this crate itself produced).
pub fn dump(suspension: &Suspension) -> Result<Vec<u8>, CheckpointError> {
    postcard::to_allocvec(suspension).map_err(CheckpointError::Encode)
}

/// Deserializes a [`Suspension`] previously produced by [`dump`].
///
/// # Errors
/// Returns [`CheckpointError::Decode`] if `bytes` is truncated, corrupt, or
/// was not produced by [`dump`].
pub fn load(bytes: &[u8]) -> Result<Suspension, CheckpointError> {
    postcard::from_bytes(bytes).map_err(CheckpointError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Continuation, Value};

    #[test]
    fn a_pending_call_survives_a_round_trip() {
        let mut kwargs = crate::suspension::Kwargs::new();
        kwargs.insert("continuation".to_owned(), Value::Continuation(Continuation { name: "f__abcd1234".to_owned(), bound: vec![Value::Int(3)] }));
        let original = Suspension::call("checkpoint", vec![Value::Int(42)], kwargs);

        let bytes = dump(&original).expect("encodes");
        let restored = load(&bytes).expect("decodes");

        match restored {
            Suspension::Call { callee, args, kwargs } => {
                assert_eq!(callee, "checkpoint");
                assert_eq!(args, vec![Value::Int(42)]);
                match kwargs.get("continuation") {
                    Some(Value::Continuation(c)) => {
                        assert_eq!(c.name, "f__abcd1234");
                        assert_eq!(c.bound, vec![Value::Int(3)]);
                    }
                    other => panic!("expected a continuation kwarg, found {other:?}"),
                }
            }
            other => panic!("expected a Call suspension, found {other:?}"),
        }
    }

    #[test]
    fn a_pending_yield_survives_a_round_trip() {
        let original = Suspension::yield_(Value::Str("hi".to_owned()), Continuation { name: "g__ffeeddcc".to_owned(), bound: vec![] });

        let bytes = dump(&original).expect("encodes");
        let restored = load(&bytes).expect("decodes");

        match restored {
            Suspension::Yield { value, continuation } => {
                assert_eq!(value, Value::Str("hi".to_owned()));
                assert_eq!(continuation.name, "g__ffeeddcc");
            }
            other => panic!("expected a Yield suspension, found {other:?}"),
        }
    }

    #[test]
    fn corrupt_bytes_are_rejected_rather_than_silently_misread() {
        let err = load(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, CheckpointError::Decode(_)));
    }
}
