use super::*;

/// Interpreter well-known names this crate knows how to look for on `PATH`
/// during `auto_configure`, along with the fixed argv prefix isolate-style
/// jailed interpreters conventionally want (`-E -B` suppresses Python's
/// environment-driven behavior and bytecode writing).
const AUTO_CONFIGURE_CANDIDATES: &[(&str, &[&str])] = &[
  ("python", &["-E", "-B"]),
  ("python3", &["-E", "-B"]),
  ("node", &[]),
  ("ruby", &[]),
];

#[derive(Debug, Clone)]
pub struct Command {
  pub name: String,
  pub binary_path: Utf8PathBuf,
  pub user: Option<String>,
  pub argv_prefix: Vec<String>,
  pub default_limits: LimitProfile,
}

impl Command {
  pub fn new(name: impl Into<String>, binary_path: impl Into<Utf8PathBuf>) -> Self {
    Self {
      name: name.into(),
      binary_path: binary_path.into(),
      user: None,
      argv_prefix: Vec::new(),
      default_limits: LimitProfile::default(),
    }
  }

  pub fn user(self, user: impl Into<String>) -> Self {
    Self {
      user: Some(user.into()),
      ..self
    }
  }

  pub fn argv_prefix(self, argv_prefix: Vec<String>) -> Self {
    Self {
      argv_prefix,
      ..self
    }
  }

  pub fn default_limits(self, default_limits: LimitProfile) -> Self {
    Self {
      default_limits,
      ..self
    }
  }
}

fn registry() -> &'static RwLock<HashMap<String, Command>> {
  static REGISTRY: OnceLock<RwLock<HashMap<String, Command>>> = OnceLock::new();
  REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Adds or replaces the entry for `command.name`. Registering the same name
/// with identical fields twice is indistinguishable from registering it once.
pub fn register(command: Command) {
  info!("registering command {:?}", command.name);
  registry()
    .write()
    .expect("command registry lock poisoned")
    .insert(command.name.clone(), command);
}

pub fn is_registered(name: &str) -> bool {
  registry()
    .read()
    .expect("command registry lock poisoned")
    .contains_key(name)
}

pub fn resolve(name: &str) -> Result<Command> {
  registry()
    .read()
    .expect("command registry lock poisoned")
    .get(name)
    .cloned()
    .ok_or_else(|| Error::UnknownCommand(name.to_string()))
}

static AUTO_CONFIGURED: OnceLock<()> = OnceLock::new();

/// Idempotent: the second and later calls observe `AUTO_CONFIGURED` already
/// set and do nothing, matching spec's "auto_configure() called twice has
/// the same effect as called once".
pub fn auto_configure() {
  AUTO_CONFIGURED.get_or_init(probe_and_register);
}

fn probe_and_register() {
  let sibling_dir = env::var_os("JAILCELL_BIN_DIR").map(PathBuf::from);
  let mut found_any = false;

  for (name, argv_prefix) in AUTO_CONFIGURE_CANDIDATES {
    let candidate = sibling_dir
      .as_ref()
      .map(|dir| dir.join(name))
      .filter(|path| path.is_file())
      .or_else(|| find_on_path(name));

    let Some(path) = candidate else { continue };

    let Ok(binary_path) = Utf8PathBuf::from_path_buf(path) else {
      continue;
    };

    let mut command =
      Command::new(*name, binary_path).argv_prefix(argv_prefix.iter().map(|s| s.to_string()).collect());

    if let Ok(user) = env::var(format!("JAILCELL_{}_USER", name.to_uppercase())) {
      command = command.user(user);
    }

    register(command);
    found_any = true;
  }

  if !found_any {
    warn!("auto_configure found no interpreters on PATH");
  }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
  let path_var = env::var_os("PATH")?;
  env::split_paths(&path_var)
    .map(|dir| dir.join(name))
    .find(|candidate| candidate.is_file())
}
