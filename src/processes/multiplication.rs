// src/processes/multiplication.rs

use std::sync::Arc;

use tracing::warn;

use crate::config::Config;
use crate::errors::{Result, SchedError};
use crate::pipeline::{Datum, DatumType, Process, ProcessCore, StepStatus};

pub const TYPE_NAME: &str = "multiplication";
pub const PORT_FACTOR1: &str = "factor1";
pub const PORT_FACTOR2: &str = "factor2";
pub const PORT_PRODUCT: &str = "product";

/// Multiplies one datum from each factor port per step.
///
/// Completes as soon as either input completes. If either input is empty or
/// an error for this step, the product is passed on as the same kind of
/// datum. A product that does not fit in an `i64` becomes an error datum.
#[derive(Debug)]
pub struct MultiplicationProcess {
    core: ProcessCore,
}

impl MultiplicationProcess {
    pub fn new(name: &str, _config: &Config) -> Result<Self> {
        Ok(Self {
            core: ProcessCore::new(name, TYPE_NAME)
                .with_input_port(PORT_FACTOR1, true)
                .with_input_port(PORT_FACTOR2, true)
                .with_output_port(PORT_PRODUCT),
        })
    }

    pub fn create(name: &str, config: &Config) -> Result<Arc<dyn Process>> {
        Ok(Arc::new(Self::new(name, config)?))
    }

    fn factor(&self, port: &str, datum: &Datum) -> Result<i64> {
        datum.get::<i64>().copied().ok_or_else(|| {
            SchedError::BadDatum(format!(
                "process '{}' expected an i64 on port '{port}'",
                self.core.name()
            ))
        })
    }
}

impl Process for MultiplicationProcess {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn step_impl(&self) -> Result<StepStatus> {
        let f1 = self.core.grab_from_port(PORT_FACTOR1)?;
        let f2 = self.core.grab_from_port(PORT_FACTOR2)?;

        let product = match (f1.datum_type(), f2.datum_type()) {
            (DatumType::Complete, _) | (_, DatumType::Complete) => {
                return Ok(StepStatus::Complete);
            }
            (DatumType::Error(msg), _) | (_, DatumType::Error(msg)) => Datum::error(msg.clone()),
            (DatumType::Empty, _) | (_, DatumType::Empty) => Datum::empty(),
            (DatumType::Data, DatumType::Data) => {
                let a = self.factor(PORT_FACTOR1, &f1)?;
                let b = self.factor(PORT_FACTOR2, &f2)?;
                match a.checked_mul(b) {
                    Some(product) => Datum::new(product),
                    None => {
                        warn!(process = %self.core.name(), a, b, "product overflows i64");
                        Datum::error(format!("product of {a} and {b} overflows i64"))
                    }
                }
            }
        };

        self.core.push_to_port(PORT_PRODUCT, product)?;
        Ok(StepStatus::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Edge;

    fn edge() -> Arc<Edge> {
        Arc::new(Edge::new(&Config::empty()).unwrap())
    }

    fn wired() -> (MultiplicationProcess, Arc<Edge>, Arc<Edge>, Arc<Edge>) {
        let p = MultiplicationProcess::new("mult", &Config::empty()).unwrap();
        let (a, b, out) = (edge(), edge(), edge());
        p.connect_input_port(PORT_FACTOR1, Arc::clone(&a)).unwrap();
        p.connect_input_port(PORT_FACTOR2, Arc::clone(&b)).unwrap();
        p.connect_output_port(PORT_PRODUCT, Arc::clone(&out)).unwrap();
        (p, a, b, out)
    }

    #[test]
    fn multiplies_pairs_and_completes() {
        let (p, a, b, out) = wired();
        a.push_datum(Datum::new(6i64));
        b.push_datum(Datum::new(7i64));
        a.push_datum(Datum::complete());
        b.push_datum(Datum::new(1i64));

        p.step().unwrap();
        p.step().unwrap();

        assert_eq!(out.get_datum().get::<i64>(), Some(&42));
        assert!(out.get_datum().is_complete());
    }

    #[test]
    fn empty_input_yields_empty_product() {
        let (p, a, b, out) = wired();
        a.push_datum(Datum::empty());
        b.push_datum(Datum::new(2i64));

        p.step().unwrap();
        assert_eq!(out.get_datum().datum_type(), &DatumType::Empty);
    }

    #[test]
    fn wrong_payload_type_fails_the_step() {
        let (p, a, b, _out) = wired();
        a.push_datum(Datum::new("six"));
        b.push_datum(Datum::new(7i64));

        assert!(matches!(p.step(), Err(SchedError::BadDatum(_))));
    }

    #[test]
    fn overflow_yields_error_datum_and_continues() {
        let (p, a, b, out) = wired();
        a.push_datum(Datum::new(i64::MAX));
        b.push_datum(Datum::new(2i64));
        a.push_datum(Datum::new(3i64));
        b.push_datum(Datum::new(4i64));

        p.step().unwrap();
        p.step().unwrap();

        assert!(matches!(
            out.get_datum().datum_type(),
            DatumType::Error(msg) if msg.contains("overflows")
        ));
        assert_eq!(out.get_datum().get::<i64>(), Some(&12));
        assert!(!p.core().is_complete());
    }
}
