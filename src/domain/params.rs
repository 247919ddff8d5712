//! Named parameter container used for initial guesses and fit output.
//!
//! Parameters keep insertion order. `add` inserts or overwrites by name, so a
//! container can be built up incrementally from defaults and user overrides.

use serde::{Deserialize, Serialize};

use crate::domain::types::GlobalName;
use crate::error::{IsingError, Result};

fn default_vary() -> bool {
    true
}

/// A single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    /// When false the parameter is held at `value` during minimization.
    #[serde(default = "default_vary")]
    pub vary: bool,
    /// Standard error, filled in by a fit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<f64>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            vary: true,
            stderr: None,
        }
    }

    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            vary: false,
            ..Self::new(name, value)
        }
    }
}

/// Ordered set of uniquely named parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    params: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or overwrite) a varying parameter.
    pub fn add(&mut self, name: impl Into<String>, value: f64) -> &mut Self {
        self.insert(Parameter::new(name, value))
    }

    /// Add (or overwrite) a parameter held fixed during fitting.
    pub fn add_fixed(&mut self, name: impl Into<String>, value: f64) -> &mut Self {
        self.insert(Parameter::fixed(name, value))
    }

    pub fn insert(&mut self, param: Parameter) -> &mut Self {
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(|p| p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Check the container is usable as a set of initial guesses.
    ///
    /// Containers built through `add` are always unique; this mainly guards
    /// deserialized input.
    pub fn validate(&self) -> Result<()> {
        for (i, p) in self.params.iter().enumerate() {
            if p.name.trim().is_empty() || p.name.chars().any(char::is_whitespace) {
                return Err(IsingError::InvalidGuesses(format!(
                    "parameter #{i} has an invalid name '{}'",
                    p.name
                )));
            }
            if !p.value.is_finite() {
                return Err(IsingError::InvalidGuesses(format!(
                    "parameter '{}' has non-finite value {}",
                    p.name, p.value
                )));
            }
            if self.params[..i].iter().any(|q| q.name == p.name) {
                return Err(IsingError::InvalidGuesses(format!(
                    "parameter '{}' is defined more than once",
                    p.name
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<Parameter> for Parameters {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut out = Parameters::new();
        for p in iter {
            out.insert(p);
        }
        out
    }
}

/// Starting values for the global parameters when no guesses file is given.
///
/// These are the homopolymer values the consensus ankyrin constructs are
/// usually fitted from.
pub fn default_guesses() -> Parameters {
    let mut params = Parameters::new();
    params
        .add(GlobalName::Dgn.as_str(), 5.0)
        .add(GlobalName::Dgr.as_str(), 5.0)
        .add(GlobalName::Dgc.as_str(), 5.0)
        .add(GlobalName::Dginter.as_str(), -10.0)
        .add(GlobalName::Mi.as_str(), 1.0);
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overwrites_by_name_and_keeps_order() {
        let mut p = Parameters::new();
        p.add("dGN", 1.0).add("dGR", 2.0).add("dGN", 3.0);
        let names: Vec<&str> = p.iter().map(|x| x.name.as_str()).collect();
        assert_eq!(names, vec!["dGN", "dGR"]);
        assert_eq!(p.value("dGN"), Some(3.0));
    }

    #[test]
    fn add_fixed_marks_vary_false() {
        let mut p = Parameters::new();
        p.add_fixed("mi", 1.0);
        assert!(!p.get("mi").unwrap().vary);
    }

    #[test]
    fn validate_rejects_duplicates_and_non_finite() {
        let dup: Parameters = serde_json::from_str(
            r#"[{"name":"dGN","value":1.0},{"name":"dGN","value":2.0}]"#,
        )
        .unwrap();
        assert!(matches!(dup.validate(), Err(IsingError::InvalidGuesses(_))));

        let mut nan = Parameters::new();
        nan.add("dGN", f64::NAN);
        assert!(matches!(nan.validate(), Err(IsingError::InvalidGuesses(_))));

        let mut blank = Parameters::new();
        blank.add("d GN", 1.0);
        assert!(blank.validate().is_err());

        assert!(default_guesses().validate().is_ok());
    }

    #[test]
    fn deserialized_parameters_default_to_varying() {
        let p: Parameters = serde_json::from_str(r#"[{"name":"mi","value":1.5}]"#).unwrap();
        let mi = p.get("mi").unwrap();
        assert!(mi.vary);
        assert_eq!(mi.stderr, None);
    }
}
