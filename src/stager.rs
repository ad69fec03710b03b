use super::*;

const JAILED_CODE_FILE: &str = "jailed_code";

/// A caller-supplied file or directory to copy into a staging directory.
#[derive(Debug, Clone)]
pub enum FileEntry {
  File(PathBuf),
  Dir(PathBuf),
}

impl FileEntry {
  pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();

    let metadata =
      fs::symlink_metadata(&path).map_err(|_| Error::NotFound(path.display().to_string()))?;

    if metadata.is_dir() {
      Ok(FileEntry::Dir(path))
    } else {
      Ok(FileEntry::File(path))
    }
  }

  fn source(&self) -> &Path {
    match self {
      FileEntry::File(path) | FileEntry::Dir(path) => path,
    }
  }
}

/// Copies every entry into `dir` under its basename, then strips write
/// permission from everything just copied in. Symlinks are never followed:
/// a symlink inside a copied directory is recreated as a symlink pointing at
/// the same target string, so a link to something outside the staged set
/// becomes unreadable to the guest (the target simply isn't there, or isn't
/// readable by the sandbox user), while a relative link to a sibling that
/// *was* copied in keeps working.
pub fn stage(dir: &Utf8Path, entries: &[FileEntry]) -> Result<()> {
  for entry in entries {
    let source = entry.source();

    let basename = source
      .file_name()
      .ok_or_else(|| Error::Staging(format!("{} has no file name", source.display())))?;

    let dest = dir.as_std_path().join(basename);

    match entry {
      FileEntry::File(source) => copy_file(source, &dest)?,
      FileEntry::Dir(source) => copy_tree(source, &dest)?,
    }
  }

  lock_down(dir.as_std_path())
}

fn copy_file(source: &Path, dest: &Path) -> Result<()> {
  fs::copy(source, dest)
    .map_err(|error| Error::Staging(format!("copying {}: {error}", source.display())))?;
  Ok(())
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
  fs::create_dir_all(dest)
    .map_err(|error| Error::Staging(format!("creating {}: {error}", dest.display())))?;

  let entries = fs::read_dir(source)
    .map_err(|error| Error::Staging(format!("reading {}: {error}", source.display())))?;

  for entry in entries {
    let entry = entry.map_err(|error| Error::Staging(error.to_string()))?;
    let child_source = entry.path();
    let child_dest = dest.join(entry.file_name());

    let metadata = fs::symlink_metadata(&child_source)
      .map_err(|error| Error::Staging(format!("inspecting {}: {error}", child_source.display())))?;

    if metadata.file_type().is_symlink() {
      let target = fs::read_link(&child_source)
        .map_err(|error| Error::Staging(format!("reading link {}: {error}", child_source.display())))?;

      symlink(&target, &child_dest).map_err(|error| {
        Error::Staging(format!("symlinking {}: {error}", child_dest.display()))
      })?;
    } else if metadata.is_dir() {
      copy_tree(&child_source, &child_dest)?;
    } else {
      copy_file(&child_source, &child_dest)?;
    }
  }

  Ok(())
}

/// Removes write permission from everything under `root`, recursively, but
/// leaves `root` itself writable so the host user can still tear it down.
fn lock_down(root: &Path) -> Result<()> {
  for entry in fs::read_dir(root)? {
    strip_write(&entry?.path())?;
  }

  Ok(())
}

fn strip_write(path: &Path) -> Result<()> {
  let metadata = fs::symlink_metadata(path)?;

  if metadata.file_type().is_symlink() {
    // A symlink's own permissions aren't meaningful on Linux; there is
    // nothing to strip, and the target (if any) is outside our tree.
    return Ok(());
  }

  let mode = metadata.permissions().mode() & !0o222;
  fs::set_permissions(path, fs::Permissions::from_mode(mode))?;

  if metadata.is_dir() {
    for entry in fs::read_dir(path)? {
      strip_write(&entry?.path())?;
    }
  }

  Ok(())
}

pub fn write_jailed_code(dir: &Utf8Path, code: &str) -> Result<()> {
  let path = dir.as_std_path().join(JAILED_CODE_FILE);
  fs::write(&path, code)
    .map_err(|error| Error::Staging(format!("writing {JAILED_CODE_FILE}: {error}")))?;
  Ok(())
}

pub fn remove_jailed_code(dir: &Utf8Path) -> Result<()> {
  let path = dir.as_std_path().join(JAILED_CODE_FILE);

  match fs::remove_file(&path) {
    Ok(()) => Ok(()),
    Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(error) => Err(Error::Staging(format!(
      "removing {JAILED_CODE_FILE}: {error}"
    ))),
  }
}
