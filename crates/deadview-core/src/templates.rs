//! Template universe discovery.
//!
//! Template ids are paths relative to the project root, `/`-separated,
//! e.g. `app/views/home/index.html.erb`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result};

/// Collect every template file under `root/views_dir`.
///
/// Hidden files and directories are skipped. A missing views directory
/// yields an empty set.
pub fn scan(root: &Path, views_dir: &Path) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    let dir = root.join(views_dir);
    if !dir.exists() {
        tracing::warn!("Views directory {:?} does not exist", dir);
        return Ok(ids);
    }

    walk(root, &dir, &mut ids)?;
    tracing::debug!("Found {} templates under {:?}", ids.len(), dir);
    Ok(ids)
}

fn walk(root: &Path, dir: &Path, ids: &mut BTreeSet<String>) -> Result<()> {
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read views directory: {:?}", dir))?
    {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat {:?}", path))?;
        if file_type.is_dir() {
            walk(root, &path, ids)?;
        } else if path.is_file() {
            if let Some(id) = relative_id(root, &path) {
                ids.insert(id);
            }
        }
    }
    Ok(())
}

/// Express `path` as a template id relative to `root`.
///
/// Relative paths are taken as already relative to the root. Returns `None`
/// when an absolute path lies outside the root or the path climbs with `..`.
pub fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let relative = if path.is_absolute() {
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir().ok()?.join(root)
        };
        path.strip_prefix(&root).ok()?.to_path_buf()
    } else {
        path.to_path_buf()
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<p></p>").unwrap();
    }

    #[test]
    fn test_scan_collects_nested_templates() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "app/views/home/index.html.erb");
        touch(dir.path(), "app/views/home/show.html.erb");
        touch(dir.path(), "app/views/layouts/application.html.erb");
        touch(dir.path(), "app/models/user.rb");

        let ids = scan(dir.path(), Path::new("app/views")).unwrap();
        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec![
                "app/views/home/index.html.erb",
                "app/views/home/show.html.erb",
                "app/views/layouts/application.html.erb",
            ]
        );
    }

    #[test]
    fn test_scan_skips_hidden_entries() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "app/views/home/index.html.erb");
        touch(dir.path(), "app/views/home/.index.html.erb.swp");
        touch(dir.path(), "app/views/.git/config");

        let ids = scan(dir.path(), Path::new("app/views")).unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan(dir.path(), Path::new("app/views")).unwrap().is_empty());
    }

    #[test]
    fn test_relative_id() {
        let root = Path::new("/srv/app");
        assert_eq!(
            relative_id(root, Path::new("/srv/app/app/views/a.html")),
            Some("app/views/a.html".to_string())
        );
        assert_eq!(
            relative_id(root, Path::new("./app/views/a.html")),
            Some("app/views/a.html".to_string())
        );
        assert_eq!(relative_id(root, Path::new("/etc/passwd")), None);
        assert_eq!(relative_id(root, Path::new("app/../../x")), None);
        assert_eq!(relative_id(root, Path::new("/srv/app")), None);
    }
}
