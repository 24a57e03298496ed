//! In-memory zip fixtures for the integration tests.
#![allow(dead_code)]

/// Assembles a minimal but structurally valid zip archive: local file
/// records, a central directory and an EOCD trailer. The reader ignores
/// CRCs, so they are written as zero.
pub struct ZipBuilder {
    local: Vec<u8>,
    central: Vec<u8>,
    count: u16,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            local: Vec::new(),
            central: Vec::new(),
            count: 0,
        }
    }

    /// Adds an entry with compression method 0 (stored).
    pub fn stored(mut self, name: &str, data: &[u8]) -> Self {
        self.add(name, 0, data, data.len());
        self
    }

    /// Adds an entry compressed as a raw deflate stream (method 8).
    pub fn deflated(mut self, name: &str, data: &[u8]) -> Self {
        let packed = miniz_oxide::deflate::compress_to_vec(data, 6);
        self.add(name, 8, &packed, data.len());
        self
    }

    /// Adds an entry with an arbitrary compression method, for
    /// exercising the unsupported-method error path.
    pub fn with_method(mut self, name: &str, method: u16, payload: &[u8]) -> Self {
        self.add(name, method, payload, payload.len());
        self
    }

    fn add(&mut self, name: &str, method: u16, payload: &[u8], uncompressed: usize) {
        let offset = self.local.len() as u32;

        let local = &mut self.local;
        local.extend_from_slice(&0x0403_4b50_u32.to_le_bytes());
        local.extend_from_slice(&20_u16.to_le_bytes()); // version needed
        local.extend_from_slice(&0_u16.to_le_bytes()); // flags
        local.extend_from_slice(&method.to_le_bytes());
        local.extend_from_slice(&0_u32.to_le_bytes()); // mod time + date
        local.extend_from_slice(&0_u32.to_le_bytes()); // crc-32
        local.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        local.extend_from_slice(&(uncompressed as u32).to_le_bytes());
        local.extend_from_slice(&(name.len() as u16).to_le_bytes());
        local.extend_from_slice(&0_u16.to_le_bytes()); // extra length
        local.extend_from_slice(name.as_bytes());
        local.extend_from_slice(payload);

        let central = &mut self.central;
        central.extend_from_slice(&0x0201_4b50_u32.to_le_bytes());
        central.extend_from_slice(&20_u16.to_le_bytes()); // version made by
        central.extend_from_slice(&20_u16.to_le_bytes()); // version needed
        central.extend_from_slice(&0_u16.to_le_bytes()); // flags
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&0_u32.to_le_bytes()); // mod time + date
        central.extend_from_slice(&0_u32.to_le_bytes()); // crc-32
        central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        central.extend_from_slice(&(uncompressed as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0_u16.to_le_bytes()); // extra length
        central.extend_from_slice(&0_u16.to_le_bytes()); // comment length
        central.extend_from_slice(&0_u16.to_le_bytes()); // disk number
        central.extend_from_slice(&0_u16.to_le_bytes()); // internal attrs
        central.extend_from_slice(&0_u32.to_le_bytes()); // external attrs
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());

        self.count += 1;
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with_comment(b"")
    }

    /// Finishes the archive with a trailing zip comment, which pushes
    /// the EOCD signature away from the end of the buffer.
    pub fn build_with_comment(self, comment: &[u8]) -> Vec<u8> {
        let mut out = self.local;
        let directory_offset = out.len() as u32;
        let directory_size = self.central.len() as u32;
        out.extend_from_slice(&self.central);

        out.extend_from_slice(&0x0605_4b50_u32.to_le_bytes());
        out.extend_from_slice(&0_u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0_u16.to_le_bytes()); // directory disk
        out.extend_from_slice(&self.count.to_le_bytes()); // entries on disk
        out.extend_from_slice(&self.count.to_le_bytes()); // entries total
        out.extend_from_slice(&directory_size.to_le_bytes());
        out.extend_from_slice(&directory_offset.to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(comment);
        out
    }
}

pub const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const CONTENT_OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:0717b1c2</dc:identifier>
    <dc:title>Fixture Book</dc:title>
    <dc:creator>A. Author</dc:creator>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="chapter1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="chapter1"/>
  </spine>
</package>"#;

pub const CHAPTER1: &str = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter 1</title></head>
<body><p>It was a dark and stormy night.</p></body>
</html>"#;

/// The minimal epub of the concrete open scenario: a container pointer,
/// one package document, one chapter.
pub fn minimal_epub() -> Vec<u8> {
    ZipBuilder::new()
        .stored("mimetype", b"application/epub+zip")
        .stored("META-INF/container.xml", CONTAINER_XML.as_bytes())
        .stored("OEBPS/content.opf", CONTENT_OPF.as_bytes())
        .deflated("OEBPS/chapter1.xhtml", CHAPTER1.as_bytes())
        .build()
}
