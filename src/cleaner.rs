use crate::model::Item;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Maps removed items back to the files that back them under `root`.
/// Items whose file is already gone are skipped.
pub fn backing_paths(root: &Path, items: &[Item]) -> Vec<PathBuf> {
    items
        .iter()
        .map(|item| root.join(&item.id))
        .filter(|path| path.exists())
        .collect()
}

/// Moves the files behind `items` to the OS trash.
pub fn move_to_trash(root: &Path, items: &[Item]) -> Result<usize> {
    let paths = backing_paths(root, items);
    if paths.is_empty() {
        return Ok(0);
    }

    trash::delete_all(&paths)
        .with_context(|| format!("moving {} paths to trash", paths.len()))?;
    log::info!("moved {} paths under {} to trash", paths.len(), root.display());
    Ok(paths.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemKind;
    use chrono::Utc;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn backing_paths_skip_missing_files() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("run"))?;
        File::create(dir.path().join("run").join("top.v"))?;

        let items = vec![
            Item::leaf("run/top.v", "top.v", ItemKind::File, 0, Utc::now()),
            Item::leaf("run/gone.v", "gone.v", ItemKind::File, 0, Utc::now()),
        ];
        let paths = backing_paths(dir.path(), &items);
        assert_eq!(paths, vec![dir.path().join("run").join("top.v")]);
        Ok(())
    }

    #[test]
    fn move_to_trash_logic() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test_file.txt");
        File::create(&file_path)?;

        assert!(file_path.exists());

        let item = Item::leaf("test_file.txt", "test_file.txt", ItemKind::File, 0, Utc::now());
        assert_eq!(move_to_trash(dir.path(), &[item])?, 1);

        assert!(!file_path.exists());
        Ok(())
    }

    #[test]
    fn move_to_trash_empty_list() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(move_to_trash(dir.path(), &[])?, 0);
        Ok(())
    }
}
