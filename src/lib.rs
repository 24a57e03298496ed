#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

//! EPUB library
//! lib to read and navigate through an epub file contents
//!
//! The zip container and the package documents are parsed in-crate with
//! a deliberately permissive strategy, since real-world epubs are often
//! malformed: structural failures abort the open, malformed individual
//! elements are dropped.
//!
//! # Examples
//!
//! ## Opening
//!
//! ```no_run
//! use paperback::doc::Book;
//! let book = Book::open("test.epub");
//! assert!(book.is_ok());
//! ```
//!
//! ## Getting doc metadata
//!
//! Metadata fields are optional; absence means the package simply did
//! not declare them.
//!
//! ```no_run
//! # use paperback::doc::Book;
//! # let book = Book::open("test.epub").unwrap();
//! if let Some(title) = &book.metadata.title {
//!     println!("reading {title}");
//! }
//! ```
//!
//! ## Navigating using the spine
//!
//! ```no_run
//! # use paperback::doc::Book;
//! # let book = Book::open("test.epub").unwrap();
//! for (n, item) in book.spine.iter().enumerate() {
//!     let href = &book.manifest[&item.idref].href;
//!     println!("{n}: {href} (linear: {})", item.linear);
//! }
//! ```
//!
//! ## Accessing resources
//!
//! Content is fetched lazily from the archive, decoded as text or bytes
//! by the declared media type:
//!
//! ```no_run
//! # use paperback::doc::Book;
//! # let book = Book::open("test.epub").unwrap();
//! let first = book.chapter(0).unwrap();
//! println!("{}", first.as_str().unwrap());
//! ```

mod path;
mod xmlutils;

pub mod archive;
pub mod doc;
pub mod toc;
