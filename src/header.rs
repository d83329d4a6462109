//! Header-name recognition and per-header vocabulary matching (spec.md
//! §4.5): a hand-written DFA over the handful of framing-significant
//! header names, plus small incremental matchers for their values, all
//! driven one byte at a time so they survive slice boundaries the same
//! way the rest of the message machine does.
//!
//! Grounded on the teacher's own `Header<'a>` slice-pair shape (root
//! `src/header.rs`), though the httparse-backed implementation there is
//! replaced entirely: this module never sees a complete header block,
//! only bytes.

use crate::classes::{acc_decimal, lower};
use crate::error::ErrorKind;

/// The handful of header names the message machine treats specially.
/// Anything else is a "general" header: its value is scanned but never
/// interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderToken {
    Connection,
    ProxyConnection,
    ContentLength,
    TransferEncoding,
    Upgrade,
}

impl HeaderToken {
    fn bytes(self) -> &'static [u8] {
        match self {
            HeaderToken::Connection => b"connection",
            HeaderToken::ProxyConnection => b"proxy-connection",
            HeaderToken::ContentLength => b"content-length",
            HeaderToken::TransferEncoding => b"transfer-encoding",
            HeaderToken::Upgrade => b"upgrade",
        }
    }
}

/// Header field-name recognizer. Fed lower-cased bytes one at a time;
/// once a byte deviates from every still-viable candidate the matcher
/// demotes to "general" (`candidate == None`) and stays there for the
/// rest of the name, as spec.md §4.5 and §9 describe.
#[derive(Default)]
pub(crate) struct NameMatcher {
    candidate: Option<HeaderToken>,
    index: usize,
}

impl NameMatcher {
    pub(crate) fn new() -> Self {
        NameMatcher {
            candidate: None,
            index: 0,
        }
    }

    /// Feed one lower-cased byte of the header field name.
    pub(crate) fn push(&mut self, lb: u8) {
        if self.index == 0 {
            self.candidate = match lb {
                b'c' => Some(HeaderToken::Connection), // also content-length
                b'p' => Some(HeaderToken::ProxyConnection),
                b't' => Some(HeaderToken::TransferEncoding),
                b'u' => Some(HeaderToken::Upgrade),
                _ => None,
            };
            self.index = 1;
            return;
        }

        let Some(candidate) = self.candidate else {
            return;
        };

        // The only prefix ambiguity among the recognized names:
        // "connection" and "content-length" agree on "con" and diverge
        // at index 3 ('n' continues connection, 't' switches).
        if candidate == HeaderToken::Connection && self.index == 3 && lb == b't' {
            self.candidate = Some(HeaderToken::ContentLength);
            self.index += 1;
            return;
        }

        let bytes = candidate.bytes();
        if self.index < bytes.len() && bytes[self.index] == lb {
            self.index += 1;
        } else {
            self.candidate = None;
        }
    }

    /// Called when the field name ends at `:`. `None` means a general
    /// header, not one of the five framing-significant ones.
    pub(crate) fn finish(&self) -> Option<HeaderToken> {
        self.candidate.filter(|c| self.index == c.bytes().len())
    }
}

/// Accumulates a `Content-Length` value, digit by digit, with the same
/// overflow-safe accumulation used for version numbers (spec.md §9).
#[derive(Default)]
pub(crate) struct ContentLengthMatcher {
    value: u64,
    seen_digit: bool,
}

impl ContentLengthMatcher {
    pub(crate) fn new() -> Self {
        ContentLengthMatcher {
            value: 0,
            seen_digit: false,
        }
    }

    pub(crate) fn push(&mut self, b: u8) -> Result<(), ErrorKind> {
        if matches!(b, b' ' | b'\t') {
            return if self.seen_digit {
                Ok(())
            } else {
                Err(ErrorKind::InvalidContentLength)
            };
        }
        if !b.is_ascii_digit() {
            return Err(ErrorKind::InvalidContentLength);
        }
        let digit = b - b'0';
        self.value = acc_decimal(self.value, digit, u64::MAX)
            .ok_or(ErrorKind::InvalidContentLength)?;
        self.seen_digit = true;
        Ok(())
    }

    pub(crate) fn finish(&self) -> Result<u64, ErrorKind> {
        if !self.seen_digit {
            return Err(ErrorKind::InvalidContentLength);
        }
        Ok(self.value)
    }
}

/// Matches a `Transfer-Encoding` value against the literal `chunked`,
/// ignoring incidental OWS (spec.md §4.5).
pub(crate) struct TransferEncodingMatcher {
    index: usize,
    dead: bool,
}

impl TransferEncodingMatcher {
    const CHUNKED: &'static [u8] = b"chunked";

    pub(crate) fn new() -> Self {
        TransferEncodingMatcher {
            index: 0,
            dead: false,
        }
    }

    pub(crate) fn push(&mut self, b: u8) {
        if self.dead || matches!(b, b' ' | b'\t') {
            return;
        }
        let lb = lower(b);
        if self.index < Self::CHUNKED.len() && Self::CHUNKED[self.index] == lb {
            self.index += 1;
        } else {
            self.dead = true;
        }
    }

    pub(crate) fn is_chunked(&self) -> bool {
        !self.dead && self.index == Self::CHUNKED.len()
    }
}

#[derive(Clone, Copy)]
enum ConnToken {
    KeepAlive,
    Close,
    Upgrade,
}

impl ConnToken {
    fn bytes(self) -> &'static [u8] {
        match self {
            ConnToken::KeepAlive => b"keep-alive",
            ConnToken::Close => b"close",
            ConnToken::Upgrade => b"upgrade",
        }
    }
}

/// Bits a finished [`ConnectionMatcher`] sets, mirroring the flags of
/// the same name on `Parser` (spec.md §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ConnFlags {
    pub keep_alive: bool,
    pub close: bool,
    pub upgrade: bool,
}

/// Parses a comma-separated `Connection` value one byte at a time,
/// recognizing `keep-alive`, `close`, `upgrade` case-insensitively;
/// unrecognized tokens are accepted and ignored (spec.md §4.5).
#[derive(Default)]
pub(crate) struct ConnectionMatcher {
    candidate: Option<ConnToken>,
    index: usize,
    flags: ConnFlags,
}

impl ConnectionMatcher {
    pub(crate) fn new() -> Self {
        ConnectionMatcher {
            candidate: None,
            index: 0,
            flags: ConnFlags::default(),
        }
    }

    pub(crate) fn push(&mut self, b: u8) {
        match b {
            b',' => {
                self.close_token();
                self.candidate = None;
                self.index = 0;
            }
            b' ' | b'\t' => {
                if let Some(c) = self.candidate {
                    if self.index != c.bytes().len() && self.index != 0 {
                        // whitespace inside an incomplete token kills it
                        self.candidate = None;
                    }
                }
            }
            _ => {
                let lb = lower(b);
                if self.index == 0 {
                    self.candidate = match lb {
                        b'k' => Some(ConnToken::KeepAlive),
                        b'c' => Some(ConnToken::Close),
                        b'u' => Some(ConnToken::Upgrade),
                        _ => None,
                    };
                    self.index = 1;
                } else if let Some(c) = self.candidate {
                    let bytes = c.bytes();
                    if self.index < bytes.len() && bytes[self.index] == lb {
                        self.index += 1;
                    } else {
                        self.candidate = None;
                    }
                }
            }
        }
    }

    fn close_token(&mut self) {
        if let Some(c) = self.candidate {
            if self.index == c.bytes().len() {
                match c {
                    ConnToken::KeepAlive => self.flags.keep_alive = true,
                    ConnToken::Close => self.flags.close = true,
                    ConnToken::Upgrade => self.flags.upgrade = true,
                }
            }
        }
    }

    /// Call once after the final byte of the value (there is no trailing
    /// comma to trigger the last token's completion).
    pub(crate) fn finish(mut self) -> ConnFlags {
        self.close_token();
        self.flags
    }
}
