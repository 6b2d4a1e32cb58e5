//! Safety checks before writing into or deleting a directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::prompt::{confirm, PromptChoice};

/// Tracks which directories may be removed during cleanup. A directory that
/// already held foreign content is never deleted.
pub struct DirectoryGuard<'a> {
    prompt: &'a dyn PromptChoice,
    allow_non_empty: bool,
    protected: HashSet<PathBuf>,
}

impl<'a> DirectoryGuard<'a> {
    pub fn new(prompt: &'a dyn PromptChoice, allow_non_empty: bool) -> Self {
        Self {
            prompt,
            allow_non_empty,
            protected: HashSet::new(),
        }
    }

    /// Decide whether `dir` may be written into. A non-empty directory is
    /// either accepted through the allow-non-empty flag or confirmed by the
    /// user; in both cases it becomes protected from [`DirectoryGuard::remove_dir`].
    pub fn ask_okay_to_write_into(&mut self, dir: &Path, message_if_cancelled: &str) -> Result<bool> {
        if is_empty_dir(dir)? {
            return Ok(true);
        }

        if !self.allow_non_empty {
            let question = format!(
                "The directory '{}' is not empty. Proceed anyway?",
                dir.display()
            );
            if !confirm(self.prompt, &question)? {
                println!("{message_if_cancelled}");
                return Ok(false);
            }
        }

        self.protected.insert(dir.to_path_buf());
        Ok(true)
    }

    /// Like [`DirectoryGuard::ask_okay_to_write_into`] but declining is an error.
    pub fn ensure_okay_to_write_into(&mut self, dir: &Path, message_if_cancelled: &str) -> Result<()> {
        if self.ask_okay_to_write_into(dir, message_if_cancelled)? {
            Ok(())
        } else {
            Err(Error::DirectoryWriteCancelled {
                dir: dir.to_path_buf(),
                message: message_if_cancelled.to_string(),
            })
        }
    }

    pub fn delete_permitted(&self, dir: &Path) -> bool {
        !self.protected.contains(dir)
    }

    /// Remove `dir` if deletion is permitted. Returns whether it was removed.
    pub fn remove_dir(&self, dir: &Path) -> Result<bool> {
        if !self.delete_permitted(dir) {
            tracing::warn!("keeping directory {}", dir.display());
            return Ok(false);
        }
        match std::fs::remove_dir_all(dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(format!("failed to remove {}", dir.display()), e)),
        }
    }
}

/// A missing directory counts as empty.
fn is_empty_dir(dir: &Path) -> Result<bool> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(Error::io(format!("failed to read {}", dir.display()), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedPrompt;
    use tempfile::TempDir;

    fn filled_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("foreign.txt"), "keep me").unwrap();
        temp
    }

    #[test]
    fn empty_directory_is_allowed_without_asking() {
        let temp = TempDir::new().unwrap();
        let prompt = ScriptedPrompt::new([]);
        let mut guard = DirectoryGuard::new(&prompt, false);

        assert!(guard.ask_okay_to_write_into(temp.path(), "cancelled").unwrap());
        assert!(prompt.asked().is_empty());
        assert!(guard.delete_permitted(temp.path()));
    }

    #[test]
    fn allow_non_empty_flag_protects_directory() {
        let temp = filled_dir();
        let prompt = ScriptedPrompt::new([]);
        let mut guard = DirectoryGuard::new(&prompt, true);

        assert!(guard.ask_okay_to_write_into(temp.path(), "cancelled").unwrap());
        assert!(prompt.asked().is_empty());
        assert!(!guard.remove_dir(temp.path()).unwrap());
        assert!(temp.path().join("foreign.txt").exists());
    }

    #[test]
    fn declined_prompt_is_not_allowed() {
        let temp = filled_dir();
        let prompt = ScriptedPrompt::new([0]);
        let mut guard = DirectoryGuard::new(&prompt, false);

        assert!(!guard.ask_okay_to_write_into(temp.path(), "cancelled").unwrap());
        assert!(matches!(
            DirectoryGuard::new(&ScriptedPrompt::new([0]), false)
                .ensure_okay_to_write_into(temp.path(), "copy cancelled"),
            Err(Error::DirectoryWriteCancelled { message, .. }) if message == "copy cancelled"
        ));
    }

    #[test]
    fn accepted_prompt_still_protects_foreign_content() {
        let temp = filled_dir();
        let prompt = ScriptedPrompt::new([1]);
        let mut guard = DirectoryGuard::new(&prompt, false);

        assert!(guard.ask_okay_to_write_into(temp.path(), "cancelled").unwrap());
        assert!(!guard.delete_permitted(temp.path()));
    }

    #[test]
    fn remove_dir_deletes_unprotected_tree() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("install");
        std::fs::create_dir_all(&target).unwrap();
        let prompt = ScriptedPrompt::new([]);
        let mut guard = DirectoryGuard::new(&prompt, false);
        assert!(guard.ask_okay_to_write_into(&target, "cancelled").unwrap());
        std::fs::create_dir_all(target.join("world")).unwrap();
        std::fs::write(target.join("world/level.dat"), "x").unwrap();

        assert!(guard.remove_dir(&target).unwrap());
        assert!(!target.exists());
    }
}
