use std::path::Path;

/// Derive the logical id of a template from a path.
///
/// Accepts either a path under `root` or an already-relative name, with or
/// without the `.{extension}` suffix. Separators are normalised to `/`, so the
/// same template always maps to the same cache key no matter how it was
/// addressed.
///
/// ```
/// use std::path::Path;
/// use imdl_storage::logical_id;
///
/// let root = Path::new("/srv/views");
/// assert_eq!(logical_id("/srv/views/blog/post.imdl", root, "imdl"), "blog/post");
/// assert_eq!(logical_id("blog/post", root, "imdl"), "blog/post");
/// ```
#[must_use]
pub fn logical_id(path: &str, root: &Path, extension: &str) -> String {
    let path = path.replace('\\', "/");
    let root = root.to_string_lossy().replace('\\', "/");
    let root = root.trim_end_matches('/');

    let mut rest = path.as_str();
    if !root.is_empty()
        && root != "."
        && let Some(stripped) = rest.strip_prefix(root)
        && (stripped.is_empty() || stripped.starts_with('/'))
    {
        rest = stripped;
    }

    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }

    if !extension.is_empty()
        && let Some(stem) = rest
            .strip_suffix(extension)
            .and_then(|s| s.strip_suffix('.'))
    {
        rest = stem;
    }

    rest.to_owned()
}
