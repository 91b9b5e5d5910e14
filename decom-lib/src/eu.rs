//! Engineering unit (EU) resolution.
//!
//! A decoded data number (DN) is resolved for display using the first of these that applies
//! to the field:
//!
//! 1. Enumeration lookup, falling back to the DN as text for unknown values.
//! 2. EU conversion via an [EuCalculator], falling back to the DN if conversion fails. The
//!    converted value is still passed through the field's print format.
//! 3. The field's print format applied to the DN.
//! 4. The DN itself.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::field::FieldAttrs;
use crate::value::Value;

/// Reference to a dictionary EU conversion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EuDefinition {
    pub name: String,
    #[serde(default)]
    pub units: Option<String>,
    /// Conversion parameters, interpreted by the calculator.
    #[serde(default)]
    pub parameters: Vec<f64>,
}

impl EuDefinition {
    pub fn new(name: &str, parameters: &[f64]) -> Self {
        EuDefinition {
            name: name.to_string(),
            units: None,
            parameters: parameters.to_vec(),
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EuError {
    #[error("no EU calculator available for {0:?}")]
    Unsupported(String),
    #[error("EU computation {name:?} failed: {reason}")]
    Computation { name: String, reason: String },
}

/// Capability to convert a DN to an engineering value.
pub trait EuCalculator: Send + Sync {
    /// Compute the EU for `dn`.
    ///
    /// # Errors
    /// Any failure to compute a value. Failures are never fatal to decoding.
    fn compute(&self, def: &EuDefinition, dn: f64) -> Result<f64, EuError>;
}

/// Polynomial conversion where `parameters[i]` is the coefficient of `dn^i`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolynomialEu;

impl EuCalculator for PolynomialEu {
    fn compute(&self, def: &EuDefinition, dn: f64) -> Result<f64, EuError> {
        if def.parameters.is_empty() {
            return Err(EuError::Computation {
                name: def.name.clone(),
                reason: "no coefficients".to_string(),
            });
        }
        // Horner's method
        let eu = def
            .parameters
            .iter()
            .rev()
            .fold(0.0, |acc, coef| acc * dn + coef);
        if !eu.is_finite() {
            return Err(EuError::Computation {
                name: def.name.clone(),
                reason: format!("non-finite result for dn={dn}"),
            });
        }
        Ok(eu)
    }
}

/// Resolves DNs to display values. See the [module docs](self) for the precedence.
#[derive(Clone, Default)]
pub struct EuResolver {
    calculator: Option<Arc<dyn EuCalculator>>,
}

impl std::fmt::Debug for EuResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EuResolver")
            .field("calculator", &self.calculator.is_some())
            .finish()
    }
}

impl EuResolver {
    pub fn new(calculator: Arc<dyn EuCalculator>) -> Self {
        EuResolver {
            calculator: Some(calculator),
        }
    }

    /// Resolve `dn` for the field `name` with attributes `attrs`.
    pub fn resolve(&self, name: &str, dn: &Value, attrs: &FieldAttrs) -> Value {
        self.resolve_inner(name, dn, attrs, true)
    }

    /// Resolve as [Self::resolve] without applying the print format. Used when values are
    /// collected and formatted together.
    pub fn resolve_unformatted(&self, name: &str, dn: &Value, attrs: &FieldAttrs) -> Value {
        self.resolve_inner(name, dn, attrs, false)
    }

    fn resolve_inner(&self, name: &str, dn: &Value, attrs: &FieldAttrs, format: bool) -> Value {
        let print_format = attrs.print_format.as_ref().filter(|_| format);

        if let Some(table) = attrs.lookup.as_ref().filter(|_| dn.is_numeric()) {
            let symbol = dn.as_i64().and_then(|v| table.lookup(v));
            return match symbol {
                Some(s) => Value::Text(s.to_string()),
                None => Value::Text(dn.to_string()),
            };
        }

        if let Some(def) = attrs.eu.as_ref().filter(|_| dn.is_numeric()) {
            let computed = match (&self.calculator, dn.as_f64()) {
                (Some(calc), Some(v)) => calc.compute(def, v),
                _ => Err(EuError::Unsupported(def.name.clone())),
            };
            return match computed {
                Ok(eu) => match print_format {
                    Some(fmt) => Value::Text(fmt.render_one(&Value::Float(eu))),
                    None => Value::Float(eu),
                },
                Err(err) => {
                    warn!(field = name, dn = %dn, "EU conversion failed, using DN: {err}");
                    dn.clone()
                }
            };
        }

        match print_format {
            Some(fmt) => Value::Text(fmt.render_one(dn)),
            None => dn.clone(),
        }
    }
}
