use super::*;

/// A seam over the handful of syscalls whose outcome depends on privileges
/// the test process may not have, so unit tests can exercise both branches
/// without actually running as root.
pub trait System {
  fn is_root(&self) -> bool;
}

pub struct MaterialSystem;

impl System for MaterialSystem {
  fn is_root(&self) -> bool {
    geteuid().is_root()
  }
}

#[cfg(test)]
pub struct MockSystem {
  pub root: bool,
}

#[cfg(test)]
impl System for MockSystem {
  fn is_root(&self) -> bool {
    self.root
  }
}
