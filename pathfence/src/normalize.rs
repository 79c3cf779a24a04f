//! Lexical path resolution (no filesystem access).

use std::path::{Component, Path, PathBuf};

/// Normalize a path lexically: drop `.` segments and collapse `..` against the
/// preceding component. `..` never climbs above the root.
pub fn normalize_path_lexically(path: &Path) -> PathBuf {
    let mut stack = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match stack.last() {
                Some(Component::Normal(_)) => {
                    stack.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => stack.push(component),
            },
            c => stack.push(c),
        }
    }

    stack.iter().collect()
}

/// Resolve `path` to an absolute, dot-free form, joining relative input onto
/// `base`. `base` is expected to be absolute already.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path_lexically(path)
    } else {
        normalize_path_lexically(&base.join(path))
    }
}
