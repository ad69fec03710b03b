#![cfg(feature = "integration")]

//! Exercises the full stack against a real interpreter. These tests need a
//! `python3` on `PATH` and, for the privilege-drop-dependent scenarios, a
//! pre-provisioned sandbox user authorized in `sudoers` for passwordless
//! `sudo -u <user> -n --`, named by `JAILCELL_TEST_SANDBOX_USER`. Neither is
//! available in an ordinary CI sandbox, which is exactly why these are
//! feature-gated rather than run by default.

use {
  jailcell::{jail_code, ExecutionResult, FileEntry, Jail},
  std::{collections::HashMap, env, os::unix::fs::symlink, path::PathBuf},
  tempfile::TempDir,
};

const COMMAND_NAME: &str = "jailcell-test-python";

fn python_binary() -> Option<PathBuf> {
  if let Ok(path) = env::var("JAILCELL_TEST_PYTHON") {
    return Some(PathBuf::from(path));
  }

  env::var_os("PATH").and_then(|path_var| {
    env::split_paths(&path_var)
      .map(|dir| dir.join("python3"))
      .find(|candidate| candidate.is_file())
  })
}

fn sandbox_user() -> Option<String> {
  env::var("JAILCELL_TEST_SANDBOX_USER").ok()
}

/// Registers the test command once per process, returning `None` (and
/// printing why) when a `python3` can't be found on this host.
fn configured() -> Option<()> {
  let binary = python_binary()?;

  if !jailcell::is_configured(COMMAND_NAME) {
    jailcell::configure(
      COMMAND_NAME,
      camino::Utf8PathBuf::from_path_buf(binary).expect("python3 path is valid UTF-8"),
      sandbox_user(),
      vec!["-E".to_string(), "-B".to_string()],
      None,
    );
  }

  Some(())
}

fn run_py(
  code: &str,
  argv: &[&str],
  stdin: &[u8],
  limits: &HashMap<String, Option<u64>>,
) -> ExecutionResult {
  let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
  jail_code(COMMAND_NAME, Some(code), &[], &argv, stdin, limits)
    .expect("jail_code should not error for a resolvable command")
}

macro_rules! require_python {
  () => {
    if configured().is_none() {
      eprintln!("skipping: no python3 on PATH");
      return;
    }
  };
}

macro_rules! require_sandbox_user {
  () => {
    if sandbox_user().is_none() {
      eprintln!("skipping: needs a pre-provisioned JAILCELL_TEST_SANDBOX_USER");
      return;
    }
  };
}

#[test]
fn hello_world() {
  require_python!();

  let result = run_py("print('Hello, world!')", &[], &[], &HashMap::new());

  assert_eq!(result.status, 0);
  assert_eq!(result.stderr, b"");
  assert_eq!(result.stdout, b"Hello, world!\n");
}

#[test]
fn argv_is_passed_through() {
  require_python!();

  let result = run_py(
    "import sys; print(':'.join(sys.argv[1:]))",
    &["Hello", "world", "-x"],
    &[],
    &HashMap::new(),
  );

  assert_eq!(result.status, 0);
  assert_eq!(result.stdout, b"Hello:world:-x\n");
}

#[test]
fn stdin_is_provided() {
  require_python!();

  let result = run_py(
    "import json, sys; print(sum(json.load(sys.stdin)))",
    &[],
    b"[1, 2.5, 33]",
    &HashMap::new(),
  );

  assert_eq!(result.status, 0);
  assert_eq!(result.stdout, b"36.5\n");
}

#[test]
fn files_are_copied_in_and_readable() {
  require_python!();

  let jail = Jail::open().unwrap();
  let hello = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/hello.txt");

  let result = jail
    .run_code(
      COMMAND_NAME,
      Some("print('Look:', open('hello.txt').read())"),
      &[FileEntry::from_path(hello).unwrap()],
      &[],
      &[],
      &HashMap::new(),
    )
    .unwrap();

  assert_eq!(result.status, 0);
  assert_eq!(result.stdout, b"Look: Hello there.\n\n");
}

#[test]
fn memory_cap_is_enforced() {
  require_python!();

  let limits = HashMap::from([("MEMORY".to_string(), Some(30_000_000))]);
  let result = run_py("print(len(bytearray(50000000)))", &[], &[], &limits);

  assert_ne!(result.status, 0);
  assert_eq!(result.stdout, b"");
}

#[test]
fn memory_cap_can_be_disabled_with_a_null_override() {
  require_python!();

  let limits = HashMap::from([("MEMORY".to_string(), None)]);
  let result = run_py("print(len(bytearray(50000000)))", &[], &[], &limits);

  assert_eq!(result.status, 0);
  assert_eq!(result.stdout, b"50000000\n");
}

#[test]
fn exceeding_the_cpu_cap_also_flags_time_limit_exceeded() {
  require_python!();

  let limits = HashMap::from([("CPU".to_string(), Some(1))]);
  let result = run_py("print(sum(range(10**9)))", &[], &[], &limits);

  assert_ne!(result.status, 0);
  assert_eq!(result.stdout, b"");
  assert!(result.time_limit_exceeded);
}

#[test]
fn wall_clock_deadline_kills_a_sleeping_guest() {
  require_python!();

  let limits = HashMap::from([("TIME".to_string(), Some(1))]);
  let result = run_py(
    "import time; time.sleep(7); print('Done!')",
    &[],
    &[],
    &limits,
  );

  assert_ne!(result.status, 0);
  assert_eq!(result.stdout, b"");
  assert!(result.time_limit_exceeded);
}

#[test]
fn environment_is_scrubbed() {
  require_python!();

  env::set_var("HONEY_BOO_BOO", "Look!");

  let result = run_py(
    "import os\nfor name in os.environ: print(name)",
    &[],
    &[],
    &HashMap::new(),
  );

  env::remove_var("HONEY_BOO_BOO");

  assert_eq!(result.status, 0);
  assert!(!String::from_utf8_lossy(&result.stdout).contains("HONEY"));
}

#[test]
fn symlinks_pointing_outside_the_staged_set_stay_unreadable() {
  require_python!();
  require_sandbox_user!();

  let scratch = TempDir::new().unwrap();

  let not_copied = scratch.path().join("not_copied");
  std::fs::create_dir(&not_copied).unwrap();
  let linked_txt = not_copied.join("linked.txt");
  std::fs::write(&linked_txt, "Hi!").unwrap();

  let copied = scratch.path().join("copied");
  std::fs::create_dir(&copied).unwrap();
  std::fs::write(copied.join("here.txt"), "012345").unwrap();
  symlink(&linked_txt, copied.join("link.txt")).unwrap();

  let jail = Jail::open().unwrap();
  let result = jail
    .run_code(
      COMMAND_NAME,
      Some(concat!(
        "print(open('copied/here.txt').read())\n",
        "try:\n",
        "    print(open('copied/link.txt').read())\n",
        "except Exception as e:\n",
        "    print(type(e).__name__, file=__import__('sys').stderr)\n",
      )),
      &[FileEntry::from_path(&copied).unwrap()],
      &[],
      &[],
      &HashMap::new(),
    )
    .unwrap();

  assert_eq!(result.stdout, b"012345\n");
  assert!(!result.stderr.is_empty());
}

#[test]
fn cannot_write_new_files_with_a_real_sandbox_user() {
  require_python!();
  require_sandbox_user!();

  let result = run_py(
    concat!(
      "print('Trying')\n",
      "with open('mydata.txt', 'w') as f:\n",
      "    f.write('hello')\n",
    ),
    &[],
    &[],
    &HashMap::new(),
  );

  assert_ne!(result.status, 0);
  assert_eq!(result.stdout, b"Trying\n");
  assert!(String::from_utf8_lossy(&result.stderr).contains("ermission denied"));
}

#[test]
fn auto_configure_is_idempotent() {
  jailcell::auto_configure();
  jailcell::auto_configure();
}

#[test]
fn a_session_runs_more_than_one_guest_in_sequence() {
  require_python!();

  let jail = Jail::open().unwrap();

  let first = jail
    .run_code(
      COMMAND_NAME,
      Some("with open('hello.txt', 'w') as f:\n    f.write('Hello, second')\n"),
      &[],
      &[],
      &[],
      &HashMap::new(),
    )
    .unwrap();
  assert_eq!(first.status, 0);

  let second = jail
    .run_code(
      COMMAND_NAME,
      Some("print(open('hello.txt').read())"),
      &[],
      &[],
      &[],
      &HashMap::new(),
    )
    .unwrap();

  assert_eq!(second.status, 0);
  assert_eq!(second.stdout, b"Hello, second\n");
}
