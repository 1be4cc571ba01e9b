use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FolderError {
    #[error("'{0}' exists and is not a directory")]
    NotADirectory(PathBuf),
    #[error("refusing to reset symlinked directory '{0}'")]
    Symlink(PathBuf),
    #[error("refusing to reset protected directory '{0}'")]
    Protected(PathBuf),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What to do with an existing target directory before downloading into it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Create the directory if missing, keep existing content.
    #[default]
    Keep,
    /// Delete the directory and everything in it, then recreate it empty.
    Reset,
}

/// Make sure `dir` exists and is ready to receive downloads.
pub fn prepare(dir: &Path, policy: ResetPolicy) -> Result<(), FolderError> {
    let io_err = |source| FolderError::Io {
        path: dir.to_path_buf(),
        source,
    };

    match std::fs::symlink_metadata(dir) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if policy == ResetPolicy::Reset {
                return Err(FolderError::Symlink(dir.to_path_buf()));
            }
            if !dir.is_dir() {
                return Err(FolderError::NotADirectory(dir.to_path_buf()));
            }
        }
        Ok(meta) if !meta.is_dir() => return Err(FolderError::NotADirectory(dir.to_path_buf())),
        Ok(_) => {
            if policy == ResetPolicy::Reset {
                check_resettable(dir)?;
                std::fs::remove_dir_all(dir).map_err(io_err)?;
                tracing::info!("folder '{}' and its contents have been deleted", dir.display());
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(err)),
    }

    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(io_err)?;
        tracing::info!("folder '{}' has been created", dir.display());
    }
    Ok(())
}

fn check_resettable(dir: &Path) -> Result<(), FolderError> {
    let canon = dir.canonicalize().map_err(|source| FolderError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    if canon.parent().is_none() {
        return Err(FolderError::Protected(dir.to_path_buf()));
    }

    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        if home.canonicalize().map(|home| home == canon).unwrap_or(false) {
            return Err(FolderError::Protected(dir.to_path_buf()));
        }
    }

    // the working directory, or anything containing it
    if let Ok(cwd) = std::env::current_dir().and_then(|cwd| cwd.canonicalize()) {
        if cwd.starts_with(&canon) {
            return Err(FolderError::Protected(dir.to_path_buf()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_creates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");
        prepare(&target, ResetPolicy::Keep).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_keep_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("old.mp3");
        std::fs::write(&file, b"x").unwrap();
        prepare(dir.path(), ResetPolicy::Keep).unwrap();
        assert!(file.exists());
    }

    #[test]
    fn test_reset_empties_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("downloads");
        std::fs::create_dir_all(target.join("nested")).unwrap();
        std::fs::write(target.join("old.mp3"), b"x").unwrap();
        std::fs::write(target.join("nested").join("old.info.json"), b"{}").unwrap();

        prepare(&target, ResetPolicy::Reset).unwrap();

        assert!(target.is_dir());
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 0);
    }

    #[test]
    fn test_reset_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            prepare(&file, ResetPolicy::Reset),
            Err(FolderError::NotADirectory(_))
        ));
        assert!(matches!(
            prepare(&file, ResetPolicy::Keep),
            Err(FolderError::NotADirectory(_))
        ));
        assert!(file.is_file());
    }

    #[test]
    fn test_reset_rejects_root_and_cwd() {
        assert!(matches!(
            prepare(Path::new("/"), ResetPolicy::Reset),
            Err(FolderError::Protected(_))
        ));
        let cwd = std::env::current_dir().unwrap();
        assert!(matches!(
            prepare(&cwd, ResetPolicy::Reset),
            Err(FolderError::Protected(_))
        ));
        assert!(cwd.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_reset_rejects_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("keep.mp3"), b"x").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(matches!(
            prepare(&link, ResetPolicy::Reset),
            Err(FolderError::Symlink(_))
        ));
        assert!(real.join("keep.mp3").exists());
        prepare(&link, ResetPolicy::Keep).unwrap();
    }
}
