use {
  camino::{Utf8Path, Utf8PathBuf},
  log::{debug, info, warn},
  nix::unistd::geteuid,
  std::{
    collections::HashMap,
    env, fmt, fs,
    io::{Read, Write},
    os::unix::{
      fs::{symlink, PermissionsExt},
      process::{CommandExt, ExitStatusExt},
    },
    path::{Path, PathBuf},
    process::{Command as StdCommand, Stdio},
    sync::{mpsc, OnceLock, RwLock},
    thread,
    time::Duration,
  },
  thiserror::Error,
};

#[cfg(test)]
use assert_matches::assert_matches;

mod command;
mod ensure;
mod error;
mod execution_result;
mod limits;
mod path_ext;
mod runner;
mod session;
mod stager;
mod system;
mod variable;

pub use {
  command::Command,
  error::{Error, Result},
  execution_result::ExecutionResult,
  limits::{Limit, LimitProfile},
  session::Jail,
  stager::FileEntry,
};

use {
  path_ext::PathExt,
  system::{MaterialSystem, System},
  variable::{default_variables, resolve_environment, Action, Variable},
};

#[cfg(test)]
use system::MockSystem;

/// Registers a command so later `run_code`/`jail_code` calls can resolve it
/// by name. Registering the same name twice replaces the earlier entry.
pub fn configure(
  name: impl Into<String>,
  binary_path: impl Into<Utf8PathBuf>,
  user: Option<String>,
  argv_prefix: Vec<String>,
  limits: Option<LimitProfile>,
) {
  let mut command = Command::new(name, binary_path).argv_prefix(argv_prefix);

  if let Some(user) = user {
    command = command.user(user);
  }

  if let Some(limits) = limits {
    command = command.default_limits(limits);
  }

  command::register(command);
}

pub fn is_configured(name: &str) -> bool {
  command::is_registered(name)
}

/// Idempotent. Probes well-known interpreter locations and registers
/// whatever it finds; finding nothing is not an error.
pub fn auto_configure() {
  command::auto_configure();
}

/// One-shot run with an implicit `Jail`.
pub fn jail_code(
  command_name: &str,
  code: Option<&str>,
  files: &[FileEntry],
  argv: &[String],
  stdin: &[u8],
  limits: &HashMap<String, Option<u64>>,
) -> Result<ExecutionResult> {
  session::jail_code(command_name, code, files, argv, stdin, limits)
}
