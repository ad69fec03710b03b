use super::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  Inherit,
  Clear,
  Set(String),
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::Inherit => write!(f, "inherit"),
      Action::Clear => write!(f, "clear"),
      Action::Set(value) => write!(f, "set({})", value),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
  pub key: String,
  pub action: Action,
}

impl Variable {
  pub fn new(key: impl Into<String>, action: Action) -> Self {
    Self {
      key: key.into(),
      action,
    }
  }

  pub fn get_value(&self) -> Option<&str> {
    match &self.action {
      Action::Set(value) => Some(value),
      _ => None,
    }
  }

  pub fn is_clear(&self) -> bool {
    matches!(self.action, Action::Clear)
  }

  pub fn is_inherit(&self) -> bool {
    matches!(self.action, Action::Inherit)
  }

  pub fn with_set_value(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      action: Action::Set(value.into()),
    }
  }
}

/// The fixed rule list applied to every guest regardless of caller input,
/// matching isolate's own `-ELIBC_FATAL_STDERR_=1` default.
pub fn default_variables() -> Vec<Variable> {
  vec![Variable::with_set_value("LIBC_FATAL_STDERR_", "1")]
}

/// Builds the guest's environment block from a list of rules, applied in
/// order against the host's own environment. The caller is expected to have
/// already cleared the child's environment; `Clear` exists for API symmetry
/// with isolate's env-rule model and to let later rules override earlier
/// ones for the same key.
pub fn resolve_environment(variables: &[Variable]) -> Vec<(String, String)> {
  let mut resolved: Vec<(String, String)> = Vec::new();

  for variable in variables {
    resolved.retain(|(key, _)| key != &variable.key);

    match &variable.action {
      Action::Inherit => {
        if let Ok(value) = env::var(&variable.key) {
          resolved.push((variable.key.clone(), value));
        }
      }
      Action::Clear => {}
      Action::Set(value) => resolved.push((variable.key.clone(), value.clone())),
    }
  }

  resolved
}
