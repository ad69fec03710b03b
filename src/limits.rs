use super::*;

/// A single ceiling value: either a finite non-negative bound or "unlimited".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
  Value(u64),
  Unlimited,
}

impl Limit {
  pub fn value(self) -> Option<u64> {
    match self {
      Limit::Value(value) => Some(value),
      Limit::Unlimited => None,
    }
  }

  fn as_bool(self) -> bool {
    !matches!(self, Limit::Value(0))
  }
}

impl From<u64> for Limit {
  fn from(value: u64) -> Self {
    Limit::Value(value)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKey {
  Cpu,
  Time,
  Memory,
  FileSize,
  Nproc,
  CanFork,
  Proxy,
}

impl LimitKey {
  fn from_str(key: &str) -> Option<Self> {
    match key {
      "CPU" => Some(LimitKey::Cpu),
      "TIME" => Some(LimitKey::Time),
      "MEMORY" => Some(LimitKey::Memory),
      "FILE_SIZE" => Some(LimitKey::FileSize),
      "NPROC" => Some(LimitKey::Nproc),
      "CAN_FORK" => Some(LimitKey::CanFork),
      "PROXY" => Some(LimitKey::Proxy),
      _ => None,
    }
  }
}

/// The budget of per-run ceilings; every field is either a finite value or
/// `Unlimited`. `CAN_FORK` is represented here too (nonzero is "true") so
/// that merge's "every value is a non-negative integer or unlimited"
/// invariant holds uniformly across all keys, booleans included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitProfile {
  pub cpu: Limit,
  pub time: Limit,
  pub memory: Limit,
  pub file_size: Limit,
  pub nproc: Limit,
  pub can_fork: Limit,
}

impl LimitProfile {
  pub fn can_fork(&self) -> bool {
    self.can_fork.as_bool()
  }

  fn get(&self, key: LimitKey) -> Limit {
    match key {
      LimitKey::Cpu => self.cpu,
      LimitKey::Time => self.time,
      LimitKey::Memory => self.memory,
      LimitKey::FileSize => self.file_size,
      LimitKey::Nproc => self.nproc,
      LimitKey::CanFork => self.can_fork,
      LimitKey::Proxy => Limit::Unlimited,
    }
  }

  fn set(&mut self, key: LimitKey, value: Limit) {
    match key {
      LimitKey::Cpu => self.cpu = value,
      LimitKey::Time => self.time = value,
      LimitKey::Memory => self.memory = value,
      LimitKey::FileSize => self.file_size = value,
      LimitKey::Nproc => self.nproc = value,
      LimitKey::CanFork => self.can_fork = value,
      LimitKey::Proxy => {}
    }
  }

  /// Yields a new profile whose value for each known key is the override's
  /// value when present -- `None` is the "unlimited" sentinel and explicitly
  /// overrides a finite default -- and the default's value otherwise.
  /// Unknown keys are rejected so a typo in caller overrides cannot silently
  /// disable a ceiling.
  pub fn merge(&self, overrides: &HashMap<String, Option<u64>>) -> Result<LimitProfile> {
    let mut merged = *self;

    for (key, value) in overrides {
      let key = LimitKey::from_str(key).ok_or_else(|| Error::UnknownLimit(key.clone()))?;

      let limit = match value {
        Some(value) => Limit::Value(*value),
        None => Limit::Unlimited,
      };

      merged.set(key, limit);
    }

    Ok(merged)
  }
}

impl Default for LimitProfile {
  fn default() -> Self {
    Self {
      cpu: Limit::Value(1),
      time: Limit::Value(5),
      memory: Limit::Value(256_000_000),
      file_size: Limit::Value(8192 * 1024),
      nproc: Limit::Value(1),
      can_fork: Limit::Value(0),
    }
  }
}
