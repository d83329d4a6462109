//! A `no_std`, allocation-free, incremental HTTP/1.x message parser.
//!
//! [`Parser`] reads a request or response one buffer at a time, calling
//! back into a [`Settings`] table as it recognizes the start line,
//! headers, and body. It never buffers: every callback borrows directly
//! from the slice passed to [`Parser::execute`], and the parser can be
//! fed one byte per call just as well as the whole message at once.
//!
//! ```
//! use flowparse::{MessageType, Parser, Settings};
//!
//! fn on_url(p: &mut Parser<()>, url: &[u8]) -> i32 {
//!     assert_eq!(url, b"/");
//!     0
//! }
//!
//! let settings = Settings {
//!     on_url: Some(on_url),
//!     ..Settings::default()
//! };
//! let mut parser = Parser::new(MessageType::Request, ());
//! let consumed = parser.execute(&settings, b"GET / HTTP/1.1\r\n\r\n");
//! assert_eq!(consumed, 18);
//! ```

#![no_std]
#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::uninlined_format_args)]
#![deny(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
extern crate log;

mod classes;

mod error;
pub use error::{ErrorKind, Result};

mod method;
pub use method::{method_name, Method};

mod url;
pub use url::{parse_url, FieldSet, UrlComponents};

mod host;

mod header;

mod settings;
pub use settings::{DataFn, NotifyFn, Settings};

mod parser;
pub use parser::{MessageType, Parser, DEFAULT_MAX_HEADER_SIZE};

/// This crate's version, packed as `(major << 16) | (minor << 8) | patch`,
/// mirroring `http_parser_version()` in spec.md §6.
pub const fn version() -> u32 {
    const MAJOR: u32 = 0;
    const MINOR: u32 = 1;
    const PATCH: u32 = 0;
    (MAJOR << 16) | (MINOR << 8) | PATCH
}
