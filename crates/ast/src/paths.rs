use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without touching the file system
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Make `path` absolute against `base` and normalize it
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

/// Render a path with `/` separators
pub fn to_slash(path: &Path) -> String {
    let rendered = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    let joined = rendered.join("/");
    if path.has_root() && !joined.starts_with('/') && !joined.contains(':') {
        format!("/{joined}")
    } else if let Some(stripped) = joined.strip_prefix("//") {
        format!("/{stripped}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dots() {
        assert_eq!(normalize_path(Path::new("a/./b/../c.h")), PathBuf::from("a/c.h"));
        assert_eq!(normalize_path(Path::new("../x/y.h")), PathBuf::from("../x/y.h"));
        assert_eq!(normalize_path(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn absolutizes_against_base() {
        assert_eq!(
            absolutize(Path::new("src/../Actions.cpp"), Path::new("/proj")),
            PathBuf::from("/proj/Actions.cpp")
        );
        assert_eq!(
            absolutize(Path::new("/usr/include/vector"), Path::new("/proj")),
            PathBuf::from("/usr/include/vector")
        );
    }

    #[test]
    fn renders_with_forward_slashes() {
        assert_eq!(to_slash(Path::new("/proj/src/a.cpp")), "/proj/src/a.cpp");
        assert_eq!(to_slash(Path::new("src/a.cpp")), "src/a.cpp");
    }
}
