//! Flat on-disk object pool.
//!
//! Every object lives directly under the configured prefix, named by the
//! canonical text form of its UUID. Directories hold nothing but symbolic
//! links; a link's name is the user-visible entry name and its target is the
//! absolute path of the child object. Identity is the name; the store keeps
//! no records of its own.

use std::fs::{self, DirBuilder, File, Metadata, OpenOptions};
use std::os::unix::fs::{symlink, DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;
use uuid::Uuid;

use crate::facade::{Error, Result};

/// Length of the canonical hyphenated UUID text form.
const UUID_TEXT_LEN: usize = 36;

/// Pool of UUID-named artifacts under a single prefix directory.
#[derive(Debug)]
pub struct ObjectStore {
    prefix: PathBuf,
}

impl ObjectStore {
    /// Creates a store rooted at `prefix`.
    ///
    /// The prefix is canonicalized when possible so that directory-entry
    /// symlinks carry absolute targets.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.canonicalize().unwrap_or(prefix);
        Self { prefix }
    }

    /// Borrows the pool root.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Projects a UUID onto its artifact path. Pure and total.
    pub fn object_path(&self, id: &Uuid) -> PathBuf {
        self.prefix.join(id.to_string())
    }

    fn entry_path(&self, parent: &Uuid, name: &str) -> PathBuf {
        self.object_path(parent).join(name)
    }

    /// Recovers the object UUID from an artifact path's basename.
    ///
    /// Only the 36-character hyphenated form is accepted.
    pub fn uuid_from_basename(path: &Path) -> Result<Uuid> {
        let base = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(Error::InvalidArgument("entry target has no basename"))?;
        if base.len() != UUID_TEXT_LEN {
            return Err(Error::InvalidArgument("entry target is not an object name"));
        }
        Uuid::parse_str(base).map_err(|_| Error::InvalidArgument("entry target is not an object name"))
    }

    /// Opens the artifact of `id` with the given options.
    pub fn open(&self, id: &Uuid, options: &OpenOptions) -> Result<File> {
        Ok(options.open(self.object_path(id))?)
    }

    /// Creates an empty regular file artifact, mode 0600.
    pub fn mkfile(&self, id: &Uuid) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(self.object_path(id))?;
        drop(file);
        Ok(())
    }

    /// Creates an empty directory artifact, mode 0700.
    pub fn mkdir(&self, id: &Uuid) -> Result<()> {
        DirBuilder::new().mode(0o700).create(self.object_path(id))?;
        Ok(())
    }

    /// Resolves the entry `name` of `parent` to the child UUID.
    pub fn lookup(&self, parent: &Uuid, name: &str) -> Result<Uuid> {
        let target = fs::read_link(self.entry_path(parent, name))?;
        Self::uuid_from_basename(&target)
    }

    /// Installs the entry `name -> child` in `parent`.
    pub fn put_dirent(&self, parent: &Uuid, name: &str, child: &Uuid) -> Result<()> {
        symlink(self.object_path(child), self.entry_path(parent, name))?;
        Ok(())
    }

    /// Removes the entry `name` of `parent`, leaving the child untouched.
    pub fn del_dirent(&self, parent: &Uuid, name: &str) -> Result<()> {
        fs::remove_file(self.entry_path(parent, name))?;
        Ok(())
    }

    /// Removes the entry `name` of `parent` and the artifact it points to.
    ///
    /// The entry's target is resolved back to a UUID up front and the
    /// artifact is unlinked via the re-projected path, so a concurrently
    /// re-pointed link can never direct the unlink outside the pool. The
    /// entry is removed before the artifact; if entry removal fails the
    /// artifact is untouched.
    pub fn del_dirent_full(&self, parent: &Uuid, name: &str) -> Result<()> {
        let child = self.lookup(parent, name)?;
        self.del_dirent(parent, name)?;
        remove_artifact(&self.object_path(&child))
    }

    /// Host stat of the artifact of `id`.
    pub fn stat(&self, id: &Uuid) -> Result<Metadata> {
        Ok(fs::metadata(self.object_path(id))?)
    }

    /// Adjusts both timestamps of the artifact of `id`.
    pub fn chtimes(&self, id: &Uuid, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        filetime::set_file_times(
            self.object_path(id),
            FileTime::from_system_time(atime),
            FileTime::from_system_time(mtime),
        )?;
        Ok(())
    }

    /// Path-based truncate, used when no cached handle exists.
    pub fn truncate(&self, id: &Uuid, size: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(self.object_path(id))?;
        file.set_len(size)?;
        Ok(())
    }

    /// Lists entry names of the directory artifact of `id`, unordered.
    ///
    /// Opens one transient descriptor which is released before returning.
    pub fn readdirnames(&self, id: &Uuid) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.object_path(id))? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

/// Removes an object artifact, whichever variant it is.
///
/// Directories must already be empty; recursive removal is not offered.
fn remove_artifact(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == std::io::ErrorKind::IsADirectory => {
            Ok(fs::remove_dir(path)?)
        }
        other => Ok(other?),
    }
}
