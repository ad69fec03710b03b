use super::*;

const STAGING_DIR_MODE: u32 = 0o775;

/// A scoped acquisition of a staging directory that can host multiple
/// sequential guest runs. Teardown happens in `Drop` so the directory is
/// released on every exit path -- normal return, early error, or an abnormal
/// unwind out of the caller's scope.
pub struct Jail {
  dir: Utf8PathBuf,
}

impl Jail {
  pub fn open() -> Result<Self> {
    let path = tempfile::Builder::new()
      .prefix("jailcell-")
      .tempdir()
      .map_err(|error| Error::Staging(format!("creating staging directory: {error}")))?
      .into_path();

    path
      .create(STAGING_DIR_MODE)
      .map_err(|error| Error::Staging(error.to_string()))?;

    let dir = Utf8PathBuf::from_path_buf(path)
      .map_err(|path| Error::Staging(format!("staging path {path:?} is not valid UTF-8")))?;

    debug!("opened jail session at {dir}");

    Ok(Jail { dir })
  }

  fn dir(&self) -> &Utf8Path {
    &self.dir
  }

  pub fn run_code(
    &self,
    command_name: &str,
    code: Option<&str>,
    files: &[FileEntry],
    argv: &[String],
    stdin: &[u8],
    overrides: &HashMap<String, Option<u64>>,
  ) -> Result<ExecutionResult> {
    let command = command::resolve(command_name)?;
    let limits = command.default_limits.merge(overrides)?;

    if !files.is_empty() {
      stager::stage(self.dir(), files)?;
    }

    if let Some(code) = code {
      stager::write_jailed_code(self.dir(), code)?;
    }

    let result = runner::run(&command, &limits, code, argv, stdin, self.dir());

    if code.is_some() {
      let _ = stager::remove_jailed_code(self.dir());
    }

    result
  }

  /// Tears down the session explicitly. Dropping a `Jail` without calling
  /// this does the same thing -- `close` exists for callers that want to
  /// observe teardown failures rather than have them only logged.
  pub fn close(self) -> Result<()> {
    self.teardown(&MaterialSystem)
  }

  fn teardown(&self, system: &impl System) -> Result<()> {
    match fs::remove_dir_all(self.dir.as_std_path()) {
      Ok(()) => Ok(()),
      Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => {
        self.privileged_teardown(system)
      }
      Err(error) => Err(error.into()),
    }
  }

  /// Residue left behind by the sandbox user (e.g. `__pycache__`) can't be
  /// removed by the host user directly. If we're already root, try again
  /// outright; otherwise fall back to the same pre-authorized `sudo`
  /// helper used to run the guest.
  fn privileged_teardown(&self, system: &impl System) -> Result<()> {
    warn!(
      "staging directory {} left residue the host user can't remove, escalating cleanup",
      self.dir
    );

    if system.is_root() {
      return fs::remove_dir_all(self.dir.as_std_path()).map_err(Into::into);
    }

    let status = StdCommand::new("sudo")
      .arg("-n")
      .arg("--")
      .arg("rm")
      .arg("-rf")
      .arg(self.dir.as_std_path())
      .status();

    match status {
      Ok(status) if status.success() => Ok(()),
      Ok(status) => Err(Error::Staging(format!(
        "privileged cleanup of {} exited with {status}",
        self.dir
      ))),
      Err(error) => Err(Error::Staging(format!(
        "privileged cleanup of {} failed to start: {error}",
        self.dir
      ))),
    }
  }
}

impl Drop for Jail {
  fn drop(&mut self) {
    if let Err(error) = self.teardown(&MaterialSystem) {
      warn!("jail session teardown for {} failed: {error}", self.dir);
    }
  }
}

/// One-shot convenience: opens an implicit `Jail`, runs a single command in
/// it, and tears it down on return.
pub fn jail_code(
  command_name: &str,
  code: Option<&str>,
  files: &[FileEntry],
  argv: &[String],
  stdin: &[u8],
  overrides: &HashMap<String, Option<u64>>,
) -> Result<ExecutionResult> {
  let jail = Jail::open()?;
  jail.run_code(command_name, code, files, argv, stdin, overrides)
}
