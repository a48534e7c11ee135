use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::domain::Mirror;
use crate::error::MirrorError;
use crate::name;

const TEMP_PREFIX: &str = ".drywall-";
const TEMP_SUFFIX: &str = ".tmp";
/// Mirror files are world-readable so a static web server running as another
/// user can serve them.
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Mirror files live directly under `root`, one per resource name.
#[derive(Debug, Clone)]
pub struct FsMirror {
    root: PathBuf,
}

impl FsMirror {
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolves `name` to its file, refusing anything that would leave the root.
    fn path_of(&self, name: &str) -> Result<PathBuf, MirrorError> {
        name::validate(name).map_err(|reason| MirrorError::InvalidName {
            name: name.to_owned(),
            reason,
        })?;
        Ok(self.root.join(name))
    }
}

impl Mirror for FsMirror {
    fn write(&self, name: &str, content: &[u8]) -> Result<(), MirrorError> {
        let target = self.path_of(name)?;

        // the temporary lives in the same directory so the rename stays on one filesystem
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)?;
        tmp.write_all(content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(FILE_MODE))?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| MirrorError::Io(e.error))?;

        tracing::debug!("mirror: {} written ({} bytes)", target.display(), content.len());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), MirrorError> {
        let target = self.path_of(name)?;
        match fs::remove_file(&target) {
            Ok(()) => {
                tracing::debug!("mirror: {} removed", target.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> Result<bool, MirrorError> {
        let target = self.path_of(name)?;
        Ok(target.try_exists()?)
    }

    fn digest(&self, name: &str) -> Result<Option<String>, MirrorError> {
        let target = self.path_of(name)?;
        let mut file = match File::open(&target) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(Some(hasher.finalize().to_string()))
    }
}
