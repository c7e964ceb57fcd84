// src/pipeline/datum.rs

//! Tagged values flowing through edges.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Tag of a [`Datum`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatumType {
    /// Carries a payload.
    Data,
    /// No payload for this step (also used as a plain heartbeat).
    Empty,
    /// Upstream hit a recoverable problem for this step.
    Error(String),
    /// The producing process is finished; no more data follows.
    Complete,
}

#[derive(Clone)]
pub struct Datum {
    datum_type: DatumType,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Datum {
    /// A datum carrying `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            datum_type: DatumType::Data,
            payload: Some(Arc::new(value)),
        }
    }

    pub fn empty() -> Self {
        Self {
            datum_type: DatumType::Empty,
            payload: None,
        }
    }

    pub fn complete() -> Self {
        Self {
            datum_type: DatumType::Complete,
            payload: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            datum_type: DatumType::Error(message.into()),
            payload: None,
        }
    }

    pub fn datum_type(&self) -> &DatumType {
        &self.datum_type
    }

    pub fn is_complete(&self) -> bool {
        self.datum_type == DatumType::Complete
    }

    /// Borrow the payload as `T`. `None` if there is no payload or it has a
    /// different type.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datum")
            .field("datum_type", &self.datum_type)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_typed() {
        let datum = Datum::new(42i64);
        assert_eq!(datum.datum_type(), &DatumType::Data);
        assert_eq!(datum.get::<i64>(), Some(&42));
        assert_eq!(datum.get::<i32>(), None);
    }

    #[test]
    fn control_datums_have_no_payload() {
        assert!(Datum::complete().is_complete());
        assert!(Datum::empty().get::<i64>().is_none());
        assert_eq!(
            Datum::error("boom").datum_type(),
            &DatumType::Error("boom".to_string())
        );
    }
}
