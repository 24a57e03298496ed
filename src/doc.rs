//! Manages the epub doc.
//!
//! Loads the container pointer and the package document, and assembles
//! the book model: metadata, manifest, spine, table of contents and
//! lazy resource access.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::archive::{ArchiveError, EpubArchive};
use crate::path;
use crate::toc::{self, TocEntry, TocKind};
use crate::xmlutils::{self, XMLNode};

#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("failed to read epub source at {path:?}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("META-INF/container.xml is missing")]
    ContainerMissing,
    #[error("container.xml does not declare a usable rootfile")]
    PackagePathMissing,
    #[error("package document {0} is missing from the archive")]
    PackageDocumentMissing(String),
    #[error("package document {0} could not be parsed")]
    PackageParse(String),
    #[error("Archive Error: {0}")]
    Archive(#[from] ArchiveError),
}

impl DocError {
    /// Stable machine-readable code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Source { .. } => "source-not-found",
            Self::ContainerMissing => "container-missing",
            Self::PackagePathMissing => "package-path-missing",
            Self::PackageDocumentMissing(_) => "package-document-missing",
            Self::PackageParse(_) => "package-parse",
            Self::Archive(ArchiveError::Structure(code)) => *code,
            Self::Archive(ArchiveError::UnsupportedCompression(_)) => "unsupported-compression",
            Self::Archive(_) => "archive",
        }
    }
}

/// Dublin Core metadata declared by the package document.
///
/// Absent fields were simply not declared; there are no defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
}

/// One manifest `item`, keyed by `id` in [`Book::manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Normalized path relative to the archive root.
    pub href: String,
    pub media_type: String,
    /// Space-delimited property tokens, e.g. `nav` or `cover-image`.
    pub properties: Option<String>,
}

/// One spine `itemref`; the declared order is the reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    /// True unless the itemref declares `linear="no"`.
    pub linear: bool,
}

/// Resource content, decoded according to the declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl ResourceContent {
    /// The content as text, if it was decoded as such.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }
}

/// The book model assembled from an epub container.
///
/// Immutable after a successful open; resource reads go back to the
/// archive on every call, so callers wanting memoization wrap it
/// themselves.
///
/// # Examples
///
/// ```no_run
/// use paperback::doc::Book;
///
/// let book = Book::open("novel.epub").unwrap();
/// println!("{:?}", book.metadata.title);
/// for item in &book.spine {
///     println!("chapter: {}", book.manifest[&item.idref].href);
/// }
/// ```
#[derive(Debug)]
pub struct Book {
    /// the zip archive
    archive: EpubArchive,

    /// Freshly generated unique identifier for this open.
    pub id: String,

    pub metadata: Metadata,

    /// Manifest items keyed by id. Duplicate ids keep the last
    /// declaration.
    pub manifest: HashMap<String, ManifestItem>,

    /// Reading order, exactly as declared.
    pub spine: Vec<SpineItem>,

    /// Table of contents forest; empty when the epub declares none.
    pub toc: Vec<TocEntry>,

    /// Manifest id of the cover image, if declared.
    pub cover_id: Option<String>,

    /// Directory containing the package document.
    pub base_path: String,

    /// Normalized path of the package document itself.
    pub package_path: String,
}

impl Book {
    /// Opens the epub file in `path`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use paperback::doc::Book;
    ///
    /// let book = Book::open("novel.epub");
    /// assert!(book.is_ok());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`DocError::Source`] if the path isn't readable and the
    /// structural errors of [`Self::from_bytes`] otherwise.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DocError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| DocError::Source {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(data)
    }

    /// Opens the epub contained in `data`.
    ///
    /// Any structural failure aborts the whole open; there is no
    /// partial book model. Individual malformed elements inside an
    /// otherwise valid package (a manifest item without an href, a toc
    /// entry without an anchor) are dropped silently instead.
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes are not a zip archive, the
    /// container pointer or package document is missing, or the package
    /// document can't be parsed.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DocError> {
        let archive = EpubArchive::from_bytes(data)?;

        let container = match archive.get_container_file() {
            Ok(bytes) => bytes,
            Err(ArchiveError::EntryNotFound(_)) => return Err(DocError::ContainerMissing),
            Err(err) => return Err(err.into()),
        };
        let package_path = rootfile_path(&container).ok_or(DocError::PackagePathMissing)?;

        let opf = match archive.get_entry_as_str(&package_path) {
            Ok(text) => text,
            Err(ArchiveError::EntryNotFound(_)) => {
                return Err(DocError::PackageDocumentMissing(package_path))
            }
            Err(err) => return Err(err.into()),
        };
        let root =
            xmlutils::parse(&opf).ok_or_else(|| DocError::PackageParse(package_path.clone()))?;

        let base_path = parent_dir(&package_path);
        let metadata = extract_metadata(&root);
        let manifest = extract_manifest(&root, &base_path);
        let spine = extract_spine(&root);
        let toc = extract_toc(&archive, &manifest);
        let cover_id = detect_cover(&root, &manifest);

        log::debug!(
            "opened package {package_path}: {} manifest items, {} spine items, {} toc roots",
            manifest.len(),
            spine.len(),
            toc.len(),
        );

        Ok(Self {
            archive,
            id: Uuid::new_v4().to_string(),
            metadata,
            manifest,
            spine,
            toc,
            cover_id,
            base_path,
            package_path,
        })
    }

    /// Returns the content of the manifest resource at `href`, decoded
    /// as text when the declared media type looks text-like (contains
    /// `text/`, `xml` or `html`) and as raw bytes otherwise.
    ///
    /// `href` may be relative to the package document; it is resolved
    /// against [`Self::base_path`] before the manifest lookup. Returns
    /// [`None`] when no manifest item matches or the archive entry is
    /// unreadable.
    pub fn content(&self, href: &str) -> Option<ResourceContent> {
        let wanted = path::resolve(&self.base_path, href);
        let item = self.manifest.values().find(|item| item.href == wanted)?;

        if is_text_media(&item.media_type) {
            self.archive
                .get_entry_as_str(&item.href)
                .ok()
                .map(ResourceContent::Text)
        } else {
            self.archive
                .get_entry(&item.href)
                .ok()
                .map(ResourceContent::Bytes)
        }
    }

    /// Returns the content of the `index`-th spine item.
    pub fn chapter(&self, index: usize) -> Option<ResourceContent> {
        let idref = &self.spine.get(index)?.idref;
        let href = self.manifest.get(idref)?.href.clone();
        self.content(&href)
    }

    /// Returns the cover image content, if a cover is declared.
    pub fn cover(&self) -> Option<ResourceContent> {
        let id = self.cover_id.as_deref()?;
        let href = self.manifest.get(id)?.href.clone();
        self.content(&href)
    }

    /// Hrefs of every stylesheet in the manifest, sorted.
    pub fn stylesheets(&self) -> Vec<String> {
        let mut sheets: Vec<String> = self
            .manifest
            .values()
            .filter(|item| item.media_type.contains("css"))
            .map(|item| item.href.clone())
            .collect();
        sheets.sort();
        sheets
    }
}

/// Reads the package document path out of the container pointer.
fn rootfile_path(container: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(container);
    let root = xmlutils::parse(&text)?;
    let rootfile = root.find("rootfile")?;
    rootfile
        .get_attr("full-path")
        .or_else(|| rootfile.get_attr("fullpath"))
        .map(path::normalize)
}

/// Directory part of a normalized archive path, empty at the root.
fn parent_dir(archive_path: &str) -> String {
    archive_path
        .rsplit_once('/')
        .map_or_else(String::new, |(dir, _)| dir.to_string())
}

fn is_text_media(media_type: &str) -> bool {
    media_type.contains("text/") || media_type.contains("xml") || media_type.contains("html")
}

fn extract_metadata(root: &XMLNode) -> Metadata {
    let meta = root.find("metadata");
    let field = |name: &str| {
        meta.and_then(|meta| dc_child(meta, name))
            .and_then(XMLNode::get_text)
    };

    Metadata {
        identifier: field("identifier"),
        title: field("title"),
        creator: field("creator"),
        language: field("language"),
        publisher: field("publisher"),
        description: field("description"),
    }
}

/// First descendant whose tag is `name` under any prefix, so both
/// `<dc:title>` and a bare `<title>` match.
fn dc_child<'a>(node: &'a XMLNode, name: &str) -> Option<&'a XMLNode> {
    for child in &node.children {
        let local = child.name.rsplit(':').next().unwrap_or(&child.name);
        if local == name {
            return Some(child);
        }
        if let Some(found) = dc_child(child, name) {
            return Some(found);
        }
    }
    None
}

fn extract_manifest(root: &XMLNode, base: &str) -> HashMap<String, ManifestItem> {
    let mut manifest = HashMap::new();
    let Some(node) = root.find("manifest") else {
        return manifest;
    };

    for item in node.find_all("item") {
        let (Some(id), Some(href), Some(media_type)) = (
            item.get_attr("id"),
            item.get_attr("href"),
            item.get_attr("media-type")
                .or_else(|| item.get_attr("mediatype")),
        ) else {
            // malformed manifest entries are common and non-fatal
            log::debug!("dropping manifest item without id, href or media-type");
            continue;
        };

        manifest.insert(
            id.to_string(),
            ManifestItem {
                id: id.to_string(),
                href: path::resolve(base, href),
                media_type: media_type.to_string(),
                properties: item.get_attr("properties").map(str::to_string),
            },
        );
    }

    manifest
}

fn extract_spine(root: &XMLNode) -> Vec<SpineItem> {
    let Some(node) = root.find("spine") else {
        return Vec::new();
    };

    node.find_all("itemref")
        .into_iter()
        .filter_map(|itemref| {
            let idref = itemref.get_attr("idref")?;
            Some(SpineItem {
                idref: idref.to_string(),
                linear: itemref.get_attr("linear") != Some("no"),
            })
        })
        .collect()
}

/// Tries the epub 3 nav document first, then the legacy NCX; the first
/// strategy that yields a parseable document wins. No toc at all is not
/// an error.
fn extract_toc(archive: &EpubArchive, manifest: &HashMap<String, ManifestItem>) -> Vec<TocEntry> {
    let nav_item = manifest.values().find(|item| has_property(item, "nav"));
    if let Some(item) = nav_item {
        if let Some(entries) = load_toc(archive, item, TocKind::Nav) {
            return entries;
        }
    }

    let ncx_item = manifest
        .values()
        .find(|item| item.media_type == "application/x-dtbncx+xml");
    if let Some(item) = ncx_item {
        if let Some(entries) = load_toc(archive, item, TocKind::Ncx) {
            return entries;
        }
    }

    Vec::new()
}

fn load_toc(archive: &EpubArchive, item: &ManifestItem, kind: TocKind) -> Option<Vec<TocEntry>> {
    let text = archive.get_entry_as_str(&item.href).ok()?;
    let root = xmlutils::parse(&text)?;
    // hrefs resolve against the navigation document's own directory
    Some(toc::build(kind, &root, &parent_dir(&item.href)))
}

fn has_property(item: &ManifestItem, token: &str) -> bool {
    item.properties
        .as_deref()
        .is_some_and(|properties| properties.split_whitespace().any(|t| t == token))
}

/// The cover is declared either by a `cover-image` manifest property or
/// by a `<meta name="cover" content="…">` metadata element.
fn detect_cover(root: &XMLNode, manifest: &HashMap<String, ManifestItem>) -> Option<String> {
    if let Some(item) = manifest
        .values()
        .find(|item| has_property(item, "cover-image"))
    {
        return Some(item.id.clone());
    }

    let meta = root.find("metadata")?;
    meta.find_all("meta").into_iter().find_map(|element| {
        if element.get_attr("name") == Some("cover") {
            element.get_attr("content").map(str::to_string)
        } else {
            None
        }
    })
}
