//! Mutation operators applied when evolving an organism.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use crate::genome::Genome;
use crate::RegistryError;

/// Default factor for a parameter shift.
pub const DEFAULT_SHIFT_FACTOR: f64 = 1.1;

/// A single mutation operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    /// Replace identifier tokens (`old -> new`), e.g. one gate for another.
    GateSubstitution {
        /// Identifier replacements
        replacements: BTreeMap<String, String>,
    },

    /// Multiply numeric literals by `factor`.
    ///
    /// With `fields` unset this touches every numeric literal in the genetic
    /// code, including qubit indices and literals outside any trait. That is
    /// deliberately broad; set `fields` to limit the shift to the values of
    /// specific traits.
    ParameterShift {
        /// Multiplier
        factor: f64,
        /// Trait keys whose values are shifted (None = all literals)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<String>>,
    },

    /// Rewrite the value of `key: value` pairs.
    TraitModification {
        /// New values by trait key
        traits: BTreeMap<String, String>,
    },
}

impl Mutation {
    /// Operator name as used in metadata and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::GateSubstitution { .. } => "gate_substitution",
            Mutation::ParameterShift { .. } => "parameter_shift",
            Mutation::TraitModification { .. } => "trait_modification",
        }
    }

    fn validate(&self) -> Result<(), RegistryError> {
        match self {
            Mutation::GateSubstitution { replacements } => {
                if replacements.is_empty() {
                    return Err(RegistryError::Validation(
                        "gate substitution has no replacements".into(),
                    ));
                }
                if let Some(bad) = replacements.keys().find(|k| !is_identifier(k)) {
                    return Err(RegistryError::Validation(format!(
                        "gate '{}' is not an identifier",
                        bad
                    )));
                }
            }
            Mutation::ParameterShift { factor, .. } => {
                if !factor.is_finite() || *factor <= 0.0 {
                    return Err(RegistryError::Validation(format!(
                        "shift factor must be finite and positive, got {}",
                        factor
                    )));
                }
            }
            Mutation::TraitModification { traits } => {
                if traits.is_empty() {
                    return Err(RegistryError::Validation(
                        "trait modification has no traits".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Apply this operator to a parsed genome, returning how many edits it made.
    pub fn apply(&self, genome: &mut Genome) -> usize {
        match self {
            Mutation::GateSubstitution { replacements } => replacements
                .iter()
                .map(|(from, to)| genome.substitute_ident(from, to))
                .sum(),
            Mutation::ParameterShift { factor, fields } => {
                genome.scale_numbers(*factor, fields.as_deref())
            }
            Mutation::TraitModification { traits } => traits
                .iter()
                .map(|(key, value)| genome.set_trait(key, value))
                .sum(),
        }
    }
}

/// An ordered list of mutation operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationSpec {
    /// Operators, applied in order
    pub operators: Vec<Mutation>,
}

impl MutationSpec {
    /// Create an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a gate substitution.
    pub fn substitute_gate(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let mut replacements = BTreeMap::new();
        replacements.insert(from.into(), to.into());
        self.operators.push(Mutation::GateSubstitution { replacements });
        self
    }

    /// Add a parameter shift over every numeric literal.
    pub fn shift_parameters(mut self, factor: f64) -> Self {
        self.operators.push(Mutation::ParameterShift { factor, fields: None });
        self
    }

    /// Add a parameter shift limited to the named traits.
    pub fn shift_fields(mut self, factor: f64, fields: Vec<String>) -> Self {
        self.operators.push(Mutation::ParameterShift { factor, fields: Some(fields) });
        self
    }

    /// Add a trait modification.
    pub fn modify_trait(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut traits = BTreeMap::new();
        traits.insert(key.into(), value.into());
        self.operators.push(Mutation::TraitModification { traits });
        self
    }

    /// Check the spec before it is applied.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.operators.is_empty() {
            return Err(RegistryError::Validation("mutation spec has no operators".into()));
        }
        self.operators.iter().try_for_each(Mutation::validate)
    }

    /// Apply all operators to `code` and return the mutated text.
    pub fn apply(&self, code: &str) -> Result<String, RegistryError> {
        self.validate()?;
        let mut genome = Genome::parse(code);
        for op in &self.operators {
            let edits = op.apply(&mut genome);
            debug!("Applied {} ({} edits)", op.name(), edits);
        }
        Ok(genome.render())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
