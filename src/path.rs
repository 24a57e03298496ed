//! Archive-internal path handling.
//!
//! Every href stored in the book model goes through [`resolve`], so the
//! rest of the crate only ever deals with forward-slash paths relative
//! to the archive root.

/// Normalizes an archive-internal path.
///
/// Backslashes become forward slashes, empty and `.` segments are
/// dropped and `..` pops the previous retained segment. A `..` with
/// nothing left to pop is dropped silently; plenty of epubs in the wild
/// carry paths like that and still open in other readers.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Resolves `href` against the directory `base`, returning a normalized
/// archive-root-relative path.
///
/// A trailing query string and/or fragment is split off before
/// resolving and reattached afterwards, so `resolve("OEBPS", "ch1.xhtml#s2")`
/// yields `OEBPS/ch1.xhtml#s2`.
pub fn resolve(base: &str, href: &str) -> String {
    let (raw, suffix) = split_suffix(href);

    if base.is_empty() {
        return format!("{}{}", normalize(raw), suffix);
    }

    let base = normalize(base);
    let path = normalize(raw);

    let resolved = if path == base || path.starts_with(&format!("{base}/")) {
        // already carries the base prefix, nothing to join
        path
    } else if raw.starts_with('/') {
        // archive-root relative
        path
    } else {
        normalize(&format!("{base}/{raw}"))
    };

    format!("{resolved}{suffix}")
}

/// Splits a trailing `?query` and/or `#fragment` off an href.
fn split_suffix(href: &str) -> (&str, &str) {
    match href.find(['?', '#']) {
        Some(at) => href.split_at(at),
        None => (href, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_dot_segments() {
        assert_eq!(normalize("./OEBPS//Text/./ch1.xhtml"), "OEBPS/Text/ch1.xhtml");
        assert_eq!(normalize("OEBPS\\Text\\ch1.xhtml"), "OEBPS/Text/ch1.xhtml");
        assert_eq!(normalize("/OEBPS/ch1.xhtml"), "OEBPS/ch1.xhtml");
    }

    #[test]
    fn normalize_resolves_parent_segments() {
        assert_eq!(normalize("OEBPS/Text/../Images/cover.png"), "OEBPS/Images/cover.png");
        // an unmatched `..` is dropped, not an error
        assert_eq!(normalize("../../ch1.xhtml"), "ch1.xhtml");
    }

    #[test]
    fn resolve_joins_relative_hrefs() {
        assert_eq!(resolve("OEBPS", "chapter1.xhtml"), "OEBPS/chapter1.xhtml");
        assert_eq!(resolve("OEBPS/Text", "../Styles/main.css"), "OEBPS/Styles/main.css");
        assert_eq!(resolve("", "chapter1.xhtml"), "chapter1.xhtml");
    }

    #[test]
    fn resolve_keeps_already_resolved_paths() {
        assert_eq!(resolve("OEBPS", "OEBPS/chapter1.xhtml"), "OEBPS/chapter1.xhtml");
        assert_eq!(resolve("OEBPS", "/chapter1.xhtml"), "chapter1.xhtml");
    }

    #[test]
    fn resolve_reattaches_query_and_fragment() {
        assert_eq!(resolve("OEBPS", "ch1.xhtml#sec2"), "OEBPS/ch1.xhtml#sec2");
        assert_eq!(resolve("OEBPS", "ch1.xhtml?v=1#sec2"), "OEBPS/ch1.xhtml?v=1#sec2");
    }

    #[test]
    fn resolve_is_idempotent() {
        for href in ["chapter1.xhtml", "Text/ch2.xhtml#top", "Images/p%20q.png"] {
            let once = resolve("OEBPS", href);
            assert_eq!(resolve("OEBPS", &once), once);
        }
    }
}
