use {
  super::*,
  nix::{
    sys::{
      resource::{setrlimit, Resource},
      signal::{killpg, Signal},
    },
    unistd::{Pid, User},
  },
};

/// Argument the guest sees in `argv[0]`-equivalent position whenever inline
/// code was supplied, matching the `jailed_code` filename the stager wrote.
const JAILED_CODE_ARG: &str = "jailed_code";

/// Grace period between the `SIGTERM` and `SIGKILL` stages of a group kill.
const KILL_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Used when `TIME` is unset or explicitly unlimited: the supervisor still
/// needs *some* deadline to wait on, so it picks one far beyond any
/// realistic run rather than blocking forever on a misbehaving guest.
const UNBOUNDED_WALL_CLOCK: Duration = Duration::from_secs(315_360_000);

pub fn run(
  command: &Command,
  limits: &LimitProfile,
  code: Option<&str>,
  argv: &[String],
  stdin_bytes: &[u8],
  staging_dir: &Utf8Path,
) -> Result<ExecutionResult> {
  let full_argv = build_argv(command, code, argv);
  let mut cmd = build_command(command, &full_argv)?;

  cmd.current_dir(staging_dir.as_std_path());
  cmd.env_clear();
  for (key, value) in resolve_environment(&default_variables()) {
    cmd.env(key, value);
  }
  cmd.stdin(Stdio::piped());
  cmd.stdout(Stdio::piped());
  cmd.stderr(Stdio::piped());
  cmd.process_group(0);

  let rlimits = *limits;
  unsafe {
    cmd.pre_exec(move || apply_rlimits(&rlimits));
  }

  debug!(
    "spawning {} with argv {:?} in {staging_dir}",
    command.binary_path, full_argv
  );

  let mut child = match cmd.spawn() {
    Ok(child) => child,
    Err(error) => {
      return Ok(ExecutionResult {
        status: 127,
        stdout: Vec::new(),
        stderr: format!("failed to start {}: {error}", command.name).into_bytes(),
        time_limit_exceeded: false,
      });
    }
  };

  let pid = child.id();
  let mut stdin = child.stdin.take();
  let mut stdout = child.stdout.take().expect("stdout was piped");
  let mut stderr = child.stderr.take().expect("stderr was piped");

  let stdin_bytes = stdin_bytes.to_vec();
  let stdin_thread = thread::spawn(move || {
    if let Some(pipe) = stdin.as_mut() {
      let _ = pipe.write_all(&stdin_bytes);
    }
    // Dropping `stdin` here closes the guest's end of the pipe, signalling EOF.
  });

  let stdout_thread = thread::spawn(move || -> Vec<u8> {
    let mut buffer = Vec::new();
    let _ = stdout.read_to_end(&mut buffer);
    buffer
  });

  let stderr_thread = thread::spawn(move || -> Vec<u8> {
    let mut buffer = Vec::new();
    let _ = stderr.read_to_end(&mut buffer);
    buffer
  });

  let (status_tx, status_rx) = mpsc::channel();
  thread::spawn(move || {
    let _ = status_tx.send(child.wait());
  });

  let deadline = wall_clock_deadline(limits);
  let mut timed_out = false;

  let status = match status_rx.recv_timeout(deadline) {
    Ok(status) => status?,
    Err(mpsc::RecvTimeoutError::Timeout) => {
      timed_out = true;
      let pgid = Pid::from_raw(pid as i32);
      let _ = killpg(pgid, Signal::SIGTERM);
      thread::sleep(KILL_GRACE_PERIOD);
      let _ = killpg(pgid, Signal::SIGKILL);
      status_rx
        .recv()
        .map_err(|_| Error::Staging("lost the guest process during a timeout kill".into()))??
    }
    Err(mpsc::RecvTimeoutError::Disconnected) => {
      return Err(Error::Staging(
        "lost the guest process before it could be waited on".into(),
      ));
    }
  };

  let stdout = stdout_thread.join().unwrap_or_default();
  let stderr = stderr_thread.join().unwrap_or_default();
  let _ = stdin_thread.join();

  let (status_code, cpu_limit_hit) = encode_status(status);

  Ok(ExecutionResult {
    status: status_code,
    stdout,
    stderr,
    time_limit_exceeded: timed_out || cpu_limit_hit,
  })
}

fn build_argv(command: &Command, code: Option<&str>, argv: &[String]) -> Vec<String> {
  let mut full_argv = Vec::with_capacity(command.argv_prefix.len() + argv.len() + 1);
  full_argv.extend(command.argv_prefix.iter().cloned());

  if code.is_some() {
    full_argv.push(JAILED_CODE_ARG.to_string());
  }

  full_argv.extend(argv.iter().cloned());
  full_argv
}

/// Builds the `Command` that will run the guest. Per spec §9's design note,
/// identity switching is always delegated to the `sudo`-style privilege
/// helper when a sandbox user is configured, never to a direct `setuid`:
/// that separates "who may become the sandbox user" (an operator policy
/// enforced by `sudoers`) from this crate.
fn build_command(command: &Command, full_argv: &[String]) -> Result<StdCommand> {
  match &command.user {
    None => {
      let mut cmd = StdCommand::new(command.binary_path.as_std_path());
      cmd.args(full_argv);
      Ok(cmd)
    }
    Some(user) => {
      let resolved = User::from_name(user)
        .map_err(|error| Error::Config(format!("resolving sandbox user {user}: {error}")))?;

      ensure!(resolved.is_some(), Error::Config(format!("no such sandbox user: {user}")));

      let mut cmd = StdCommand::new("sudo");
      cmd.arg("-u").arg(user).arg("-n").arg("--");
      cmd.arg(command.binary_path.as_std_path());
      cmd.args(full_argv);
      Ok(cmd)
    }
  }
}

fn wall_clock_deadline(limits: &LimitProfile) -> Duration {
  match limits.time {
    Limit::Value(seconds) => Duration::from_secs(seconds),
    Limit::Unlimited => UNBOUNDED_WALL_CLOCK,
  }
}

/// Applies the merged limit profile as rlimits on the about-to-be-exec'd
/// child. Runs inside `pre_exec`, after `fork` but before `exec`: only
/// async-signal-safe operations are permitted here, which rules out
/// allocation, logging, and anything that could touch a mutex. `setrlimit`
/// itself is a plain syscall wrapper and satisfies that constraint.
fn apply_rlimits(limits: &LimitProfile) -> std::io::Result<()> {
  apply_one(Resource::RLIMIT_CPU, limits.cpu)?;
  apply_one(Resource::RLIMIT_AS, limits.memory)?;
  apply_one(Resource::RLIMIT_FSIZE, limits.file_size)?;
  apply_one(Resource::RLIMIT_NPROC, effective_nproc(limits))?;
  Ok(())
}

fn effective_nproc(limits: &LimitProfile) -> Limit {
  if limits.can_fork() {
    limits.nproc
  } else {
    Limit::Value(1)
  }
}

fn apply_one(resource: Resource, limit: Limit) -> std::io::Result<()> {
  let raw = match limit {
    Limit::Value(value) => value,
    Limit::Unlimited => u64::MAX,
  };

  setrlimit(resource, raw, raw).map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))
}

/// Converts a reaped `ExitStatus` into the crate's `status` shape, and
/// separately flags whether the kernel's own CPU cap is what killed it
/// (`SIGXCPU`), which the caller folds into `time_limit_exceeded` alongside
/// the supervisor's own wall-clock kill.
fn encode_status(status: std::process::ExitStatus) -> (i32, bool) {
  match status.signal() {
    Some(signal) => (128 + signal, signal == Signal::SIGXCPU as i32),
    None => (status.code().unwrap_or(-1), false),
  }
}
