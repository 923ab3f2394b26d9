use crate::model::Item;
use anyhow::{Context, Result, bail};
use jwalk::WalkDir;
use std::fs;
use std::path::{Path, PathBuf};

/// Copies the file or folder behind `item` into `dest_dir`.
///
/// An existing entry of the same name is never overwritten: the copy gets a
/// numbered name instead. Returns the path of the copy.
pub fn download(root: &Path, item: &Item, dest_dir: &Path) -> Result<PathBuf> {
    let src = root.join(&item.id);
    if !src.exists() {
        bail!("{} no longer exists", src.display());
    }
    fs::create_dir_all(dest_dir).with_context(|| format!("creating {}", dest_dir.display()))?;

    let dest = free_name(dest_dir, &item.name);
    if src.is_dir() {
        copy_tree(&src, &dest)?;
    } else {
        fs::copy(&src, &dest)
            .with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
    }
    log::info!("downloaded {} to {}", src.display(), dest.display());
    Ok(dest)
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).skip_hidden(false).sort(true) {
        let entry = entry.with_context(|| format!("walking {}", src.display()))?;
        let path = entry.path();
        let target = dest.join(path.strip_prefix(src).unwrap_or(path.as_path()));
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_context(|| format!("creating {}", target.display()))?;
        } else {
            fs::copy(&path, &target).with_context(|| format!("copying {}", path.display()))?;
        }
    }
    Ok(())
}

/// `name`, or `stem (n).ext` for the first `n` not taken in `dir`.
fn free_name(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemKind;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn file_copies_get_numbered_names() -> Result<()> {
        let root = tempdir()?;
        let dest = tempdir()?;
        fs::create_dir(root.path().join("run"))?;
        fs::write(root.path().join("run").join("top.v"), "module top;")?;
        let item = Item::leaf("run/top.v", "top.v", ItemKind::File, 11, Utc::now());

        let first = download(root.path(), &item, dest.path())?;
        let second = download(root.path(), &item, dest.path())?;

        assert_eq!(first, dest.path().join("top.v"));
        assert_eq!(second, dest.path().join("top (1).v"));
        assert_eq!(fs::read_to_string(second)?, "module top;");
        Ok(())
    }

    #[test]
    fn folders_are_copied_whole() -> Result<()> {
        let root = tempdir()?;
        let dest = tempdir()?;
        let sim = root.path().join("alu").join("sim");
        fs::create_dir_all(&sim)?;
        fs::write(sim.join("tb.v"), "tb")?;
        fs::write(root.path().join("alu").join("alu.v"), "alu")?;
        let item = Item::folder("alu", "alu", 0, Utc::now(), vec![]);

        let copy = download(root.path(), &item, dest.path())?;

        assert_eq!(fs::read_to_string(copy.join("alu.v"))?, "alu");
        assert_eq!(fs::read_to_string(copy.join("sim").join("tb.v"))?, "tb");
        Ok(())
    }

    #[test]
    fn missing_source_is_an_error() -> Result<()> {
        let root = tempdir()?;
        let dest = tempdir()?;
        let item = Item::leaf("gone.v", "gone.v", ItemKind::File, 0, Utc::now());
        assert!(download(root.path(), &item, dest.path()).is_err());
        Ok(())
    }
}
