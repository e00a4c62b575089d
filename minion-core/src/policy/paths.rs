use std::path::{Component, Path, PathBuf};

/// Normalize a claim path to an absolute, lexically clean form.
///
/// Relative paths are resolved against `base`. `.` and `..` are folded
/// without touching the filesystem, so symlinks are not followed and the
/// file need not exist.
pub fn normalize(path: &str, base: &Path) -> String {
    let raw = Path::new(path.trim());
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        base.join(raw)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root.
                if out.parent().is_some() {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().into_owned()
}
