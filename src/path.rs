//! Canonical path strings shared by both backends.
//!
//! Every path stored in a handle is normalized: a single leading `/`, no runs of `/`, and no
//! trailing `/` except for the root itself.

pub const SEPARATOR: char = '/';
pub const ROOT: &str = "/";

/// Normalizes a raw path string.
///
/// Trims surrounding whitespace, drops one leading `:`, forces a single leading `/`, collapses
/// runs of `/`, and strips trailing separators. Never fails; an empty input yields the root.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(':').unwrap_or(trimmed);

    let mut normal = String::with_capacity(trimmed.len() + 1);
    normal.push(SEPARATOR);
    for c in trimmed.chars() {
        if c == SEPARATOR && normal.ends_with(SEPARATOR) {
            continue;
        }
        normal.push(c);
    }

    while normal.len() > 1 && (normal.ends_with(SEPARATOR) || normal.ends_with(char::is_whitespace)) {
        normal.pop();
    }

    normal
}

pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Segments of a normalized path, root excluded.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|segment| !segment.is_empty())
}

/// Parent of a normalized path; `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    if is_root(path) {
        return None;
    }
    match path.rfind(SEPARATOR) {
        Some(0) | None => Some(ROOT.to_string()),
        Some(idx) => Some(path[..idx].to_string()),
    }
}

/// Last segment of a normalized path, empty for the root.
pub fn name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or("")
}

pub fn join(parent: &str, child: &str) -> String {
    normalize(&format!("{parent}{SEPARATOR}{child}"))
}

/// Strips `base` off `path`, returning the remainder without a leading separator.
pub fn relative_to<'a>(base: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(base)?;
    if !rest.is_empty() && !rest.starts_with(SEPARATOR) && !base.ends_with(SEPARATOR) {
        return None;
    }
    Some(rest.trim_start_matches(SEPARATOR))
}

pub fn extension(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

pub fn stem(name: &str) -> &str {
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_trims_separators() {
        assert_eq!(normalize("//a////b/c//"), "/a/b/c");
        assert_eq!(normalize("a/b"), "/a/b");
        assert_eq!(normalize(":docs/report.txt"), "/docs/report.txt");
        assert_eq!(normalize("  /x/ "), "/x");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize(":"), "/");
        assert_eq!(normalize("///"), "/");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "", "/", "//", ":", "::a", ": /a/", "a /", "a/ /", "  :  ", "/a/b/", "x//y//z",
            "/ leading space", "trailing.dot.", "//a////b/c//", "\t/tab/\t",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn parent_and_name() {
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/a").as_deref(), Some("/"));
        assert_eq!(parent("/a/b/c").as_deref(), Some("/a/b"));
        assert_eq!(name("/a/b/c.txt"), "c.txt");
        assert_eq!(name("/"), "");
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative_to("/src", "/src/sub/f2"), Some("sub/f2"));
        assert_eq!(relative_to("/src", "/src"), Some(""));
        assert_eq!(relative_to("/src", "/srcx/f"), None);
        assert_eq!(relative_to("/", "/a"), Some("a"));
    }

    #[test]
    fn extension_and_stem() {
        assert_eq!(extension("archive.tar.gz"), "gz");
        assert_eq!(stem("archive.tar.gz"), "archive.tar");
        assert_eq!(extension("README"), "");
        assert_eq!(stem("README"), "README");
    }
}
