//! Table of contents extraction.
//!
//! Epub 3 carries the toc in an xhtml navigation document, epub 2 in a
//! legacy NCX file. Both collapse into the same [`TocEntry`] forest via
//! one recursive builder parameterized over where each format keeps its
//! label, href and children.

use crate::path;
use crate::xmlutils::XMLNode;

/// A node in a table of contents.
///
/// `href` is resolved against the navigation document's own directory
/// and may be empty when the source omits a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub id: String,
    pub label: String,
    pub href: String,
    pub children: Vec<TocEntry>,
}

/// Which flavor of navigation document the entries come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TocKind {
    /// Epub 3 `<nav epub:type="toc">` document.
    Nav,
    /// Legacy `application/x-dtbncx+xml` document.
    Ncx,
}

/// Builds the toc forest out of a parsed navigation document.
///
/// `base` is the directory containing the navigation document itself,
/// which may differ from the package document's base path.
pub(crate) fn build(kind: TocKind, root: &XMLNode, base: &str) -> Vec<TocEntry> {
    match kind {
        TocKind::Nav => toc_nav(root)
            .and_then(|nav| nav.find("ol"))
            .map_or_else(Vec::new, |ol| entries(kind, ol, base)),
        TocKind::Ncx => root
            .find("navmap")
            .map_or_else(Vec::new, |map| entries(kind, map, base)),
    }
}

/// The `nav` element carrying the toc, marked by an `epub:type` or
/// `role` attribute containing `toc`.
fn toc_nav(root: &XMLNode) -> Option<&XMLNode> {
    root.find_all("nav").into_iter().find(|nav| {
        let marked = |attr: &str| nav.get_attr(attr).is_some_and(|value| value.contains("toc"));
        marked("epub:type") || marked("role")
    })
}

fn entries(kind: TocKind, container: &XMLNode, base: &str) -> Vec<TocEntry> {
    let item_tag = match kind {
        TocKind::Nav => "li",
        TocKind::Ncx => "navpoint",
    };

    container
        .children
        .iter()
        .filter(|child| child.name == item_tag)
        .filter_map(|item| entry(kind, item, base))
        .collect()
}

fn entry(kind: TocKind, item: &XMLNode, base: &str) -> Option<TocEntry> {
    let id = item.get_attr("id").unwrap_or_default().to_string();

    match kind {
        TocKind::Nav => {
            // an li without a linked anchor is dropped, not an error
            let anchor = item.find("a")?;
            let target = anchor.get_attr("href")?;
            let label = anchor
                .get_text()
                .unwrap_or_else(|| target.to_string());

            // a nested list inside the li holds this entry's children
            let children = item
                .children
                .iter()
                .find(|child| child.name == "ol")
                .map_or_else(Vec::new, |ol| entries(kind, ol, base));

            Some(TocEntry {
                id,
                label,
                href: path::resolve(base, target),
                children,
            })
        }
        TocKind::Ncx => {
            // label and target belong to this navpoint's own children,
            // never to a nested navpoint's
            let direct = |tag: &str| item.children.iter().find(|child| child.name == tag);
            let label = direct("navlabel")
                .and_then(|navlabel| navlabel.find("text"))
                .and_then(XMLNode::get_text)
                .unwrap_or_else(|| "Chapter".to_string());
            let href = direct("content")
                .and_then(|content| content.get_attr("src"))
                .map(|src| path::resolve(base, src))
                .unwrap_or_default();

            Some(TocEntry {
                id,
                label,
                href,
                children: entries(kind, item, base),
            })
        }
    }
}
