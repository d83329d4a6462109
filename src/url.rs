//! The URL sub-state-machine (spec.md §4.4): fed byte-by-byte from the
//! request line while the message parser is running, and also reachable
//! standalone through [`parse_url`].
//!
//! Mirrors the shape of the teacher's own `Url` type (offsets into a
//! borrowed buffer, fields that may be absent) but replaces its
//! `://`-splitting implementation with a real byte-fed DFA, since
//! spec.md requires the same state machine to be usable one byte at a
//! time from inside the message parser.

use crate::classes::{is_high_bit, is_url_terminator};
use crate::error::{ErrorKind, Result};
use crate::host;

/// One state of the URL DFA (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UrlState {
    SpacesBeforeUrl,
    Schema,
    SchemaSlash,
    SchemaSlashSlash,
    ServerStart,
    Server,
    Path,
    QueryStringStart,
    QueryString,
    FragmentStart,
    Fragment,
    Dead,
}

/// Bitmask of which fields were observed while streaming a URL through
/// the DFA, equivalent to spec.md §3's `field_set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet(u8);

impl FieldSet {
    pub const SCHEMA: FieldSet = FieldSet(1 << 0);
    pub const HOST: FieldSet = FieldSet(1 << 1);
    pub const PORT: FieldSet = FieldSet(1 << 2);
    pub const PATH: FieldSet = FieldSet(1 << 3);
    pub const QUERY: FieldSet = FieldSet(1 << 4);
    pub const FRAGMENT: FieldSet = FieldSet(1 << 5);
    pub const USERINFO: FieldSet = FieldSet(1 << 6);

    #[inline]
    fn set(&mut self, field: FieldSet) {
        self.0 |= field.0;
    }

    #[inline]
    pub fn has(self, field: FieldSet) -> bool {
        self.0 & field.0 != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for FieldSet {
    type Output = FieldSet;
    fn bitor(self, rhs: FieldSet) -> FieldSet {
        FieldSet(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Span {
    offset: u16,
    len: u16,
}

/// Decomposed URL: offset+length pairs into the caller's buffer, plus a
/// decoded `port`, matching spec.md §3's "URL decomposition record".
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlComponents {
    field_set: FieldSet,
    schema: Span,
    host: Span,
    path: Span,
    query: Span,
    fragment: Span,
    userinfo: Span,
    port: Option<u16>,
}

macro_rules! field_accessor {
    ($name:ident, $field:ident, $span:ident) => {
        pub fn $name<'a>(&self, buf: &'a [u8]) -> Option<&'a [u8]> {
            if self.field_set.has(FieldSet::$field) {
                Some(&buf[self.$span.offset as usize..(self.$span.offset + self.$span.len) as usize])
            } else {
                None
            }
        }
    };
}

impl UrlComponents {
    field_accessor!(schema, SCHEMA, schema);
    field_accessor!(host, HOST, host);
    field_accessor!(path, PATH, path);
    field_accessor!(query, QUERY, query);
    field_accessor!(fragment, FRAGMENT, fragment);
    field_accessor!(userinfo, USERINFO, userinfo);

    pub fn field_set(&self) -> FieldSet {
        self.field_set
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

/// The URL DFA itself, driven one byte at a time. The message parser
/// drives this inline while reading a request line; [`parse_url`] drives
/// an identical instance standalone over a complete buffer.
pub(crate) struct UrlMachine {
    state: UrlState,
    is_connect: bool,
    lenient: bool,
    field_start: usize,
    field_set: FieldSet,
    schema: Option<(usize, usize)>,
    userinfo: Option<(usize, usize)>,
    host: Option<(usize, usize)>,
    path: Option<(usize, usize)>,
    query: Option<(usize, usize)>,
    fragment: Option<(usize, usize)>,
}

impl UrlMachine {
    pub(crate) fn new(is_connect: bool, lenient: bool) -> Self {
        UrlMachine {
            state: if is_connect {
                UrlState::ServerStart
            } else {
                UrlState::SpacesBeforeUrl
            },
            is_connect,
            lenient,
            field_start: 0,
            field_set: FieldSet::default(),
            schema: None,
            userinfo: None,
            host: None,
            path: None,
            query: None,
            fragment: None,
        }
    }

    pub(crate) fn state(&self) -> UrlState {
        self.state
    }

    fn is_url_char(&self, b: u8) -> bool {
        if is_url_terminator(b) {
            return false;
        }
        if is_high_bit(b) {
            return self.lenient;
        }
        if !self.lenient && matches!(b, b'\t' | b'\x0c') {
            return false;
        }
        true
    }

    /// Feed one byte at absolute `pos` in the overall buffer being
    /// scanned (used to compute field spans). Returns `Ok(true)` if the
    /// byte was consumed as part of the URL, `Ok(false)` if this byte
    /// terminates the URL (caller should not re-feed it as a URL byte;
    /// it belongs to whatever follows, e.g. the space before the
    /// HTTP-version token).
    pub(crate) fn step(&mut self, pos: usize, b: u8) -> Result<bool> {
        use UrlState::*;

        match self.state {
            SpacesBeforeUrl => {
                if b == b' ' {
                    return Ok(true);
                }
                self.field_start = pos;
                if b == b'/' {
                    self.state = Path;
                    return Ok(true);
                }
                if b.is_ascii_alphabetic() {
                    self.state = Schema;
                    return Ok(true);
                }
                Err(ErrorKind::InvalidUrl)
            }
            Schema => {
                if b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.') {
                    return Ok(true);
                }
                if b == b':' {
                    self.schema = Some((self.field_start, pos));
                    self.field_set.set(FieldSet::SCHEMA);
                    self.state = SchemaSlash;
                    return Ok(true);
                }
                Err(ErrorKind::InvalidUrl)
            }
            SchemaSlash => {
                if b == b'/' {
                    self.state = SchemaSlashSlash;
                    return Ok(true);
                }
                Err(ErrorKind::InvalidUrl)
            }
            SchemaSlashSlash => {
                if b == b'/' {
                    self.state = ServerStart;
                    return Ok(true);
                }
                Err(ErrorKind::InvalidUrl)
            }
            ServerStart => {
                self.field_start = pos;
                if !self.is_connect && matches!(b, b'/' | b'?') {
                    self.state = Path;
                    return self.step(pos, b);
                }
                self.state = Server;
                self.step(pos, b)
            }
            Server => match b {
                b'/' | b'?' if !self.is_connect => {
                    self.finish_server(pos)?;
                    self.state = Path;
                    self.step(pos, b)
                }
                b' ' | b'\r' | b'\n' => {
                    self.finish_server(pos)?;
                    Ok(false)
                }
                b'@' => {
                    if self.userinfo.is_some() {
                        return Err(ErrorKind::InvalidUrl);
                    }
                    self.userinfo = Some((self.field_start, pos));
                    self.field_set.set(FieldSet::USERINFO);
                    self.field_start = pos + 1;
                    Ok(true)
                }
                _ if self.is_url_char(b) => Ok(true),
                _ => Err(ErrorKind::InvalidUrl),
            },
            Path => match b {
                b'?' => {
                    self.finish_path(pos);
                    self.field_start = pos + 1;
                    self.state = QueryStringStart;
                    Ok(true)
                }
                b'#' => {
                    self.finish_path(pos);
                    self.field_start = pos + 1;
                    self.state = FragmentStart;
                    Ok(true)
                }
                b' ' | b'\r' | b'\n' => {
                    self.finish_path(pos);
                    Ok(false)
                }
                _ if self.is_url_char(b) => Ok(true),
                _ => Err(ErrorKind::InvalidPath),
            },
            QueryStringStart => {
                self.state = QueryString;
                self.step(pos, b)
            }
            QueryString => match b {
                b'#' => {
                    self.finish_query(pos);
                    self.field_start = pos + 1;
                    self.state = FragmentStart;
                    Ok(true)
                }
                b' ' | b'\r' | b'\n' => {
                    self.finish_query(pos);
                    Ok(false)
                }
                _ if self.is_url_char(b) || b == b'?' => Ok(true),
                _ => Err(ErrorKind::InvalidQueryString),
            },
            FragmentStart => {
                self.state = Fragment;
                self.step(pos, b)
            }
            Fragment => match b {
                b' ' | b'\r' | b'\n' => {
                    self.finish_fragment(pos);
                    Ok(false)
                }
                _ if self.is_url_char(b) || matches!(b, b'?' | b'#') => Ok(true),
                _ => Err(ErrorKind::InvalidFragment),
            },
            Dead => Err(ErrorKind::InvalidUrl),
        }
    }

    fn finish_server(&mut self, pos: usize) -> Result<()> {
        if self.host.is_none() {
            self.host = Some((self.field_start, pos));
            self.field_set.set(FieldSet::HOST);
        }
        Ok(())
    }

    fn finish_path(&mut self, pos: usize) {
        self.path = Some((self.field_start, pos));
        self.field_set.set(FieldSet::PATH);
    }

    fn finish_query(&mut self, pos: usize) {
        self.query = Some((self.field_start, pos));
        self.field_set.set(FieldSet::QUERY);
    }

    fn finish_fragment(&mut self, pos: usize) {
        self.fragment = Some((self.field_start, pos));
        self.field_set.set(FieldSet::FRAGMENT);
    }

    /// Called when the scan ends (end of buffer for standalone parsing,
    /// or the message parser hit the terminating space/CR/LF). Finalizes
    /// whatever field was still open.
    fn finish_at_end(&mut self, end: usize) -> Result<()> {
        use UrlState::*;
        match self.state {
            Server | ServerStart => self.finish_server(end)?,
            Path => self.finish_path(end),
            QueryStringStart | QueryString => self.finish_query(end),
            FragmentStart | Fragment => self.finish_fragment(end),
            SpacesBeforeUrl | Schema | SchemaSlash | SchemaSlashSlash => {
                return Err(ErrorKind::InvalidUrl)
            }
            Dead => {}
        }
        Ok(())
    }

    fn into_components(mut self, buf: &[u8], end: usize) -> Result<UrlComponents> {
        self.finish_at_end(end)?;

        if self.field_set.has(FieldSet::SCHEMA) && !self.field_set.has(FieldSet::HOST) {
            return Err(ErrorKind::InvalidUrl);
        }

        if self.is_connect {
            let only_host_and_port = self.field_set.has(FieldSet::HOST)
                && !self.field_set.has(FieldSet::PATH)
                && !self.field_set.has(FieldSet::QUERY)
                && !self.field_set.has(FieldSet::FRAGMENT)
                && !self.field_set.has(FieldSet::SCHEMA)
                && !self.field_set.has(FieldSet::USERINFO);
            if !only_host_and_port {
                return Err(ErrorKind::InvalidUrl);
            }
        }

        let mut port = None;
        if let Some((host_start, host_end)) = self.host {
            let (hostname, p) = host::split_host_port(buf, host_start, host_end)?;
            self.host = Some(hostname);
            if let Some(p) = p {
                port = Some(p);
                self.field_set.set(FieldSet::PORT);
            }
        }

        let mk = |o: Option<(usize, usize)>| -> Span {
            match o {
                Some((s, e)) => Span {
                    offset: s as u16,
                    len: (e - s) as u16,
                },
                None => Span::default(),
            }
        };

        Ok(UrlComponents {
            field_set: self.field_set,
            schema: mk(self.schema),
            host: mk(self.host),
            path: mk(self.path),
            query: mk(self.query),
            fragment: mk(self.fragment),
            userinfo: mk(self.userinfo),
            port,
        })
    }
}

/// Standalone URL decomposition, as spec.md §4.4 and §6 describe
/// (`parse_url(buffer, is_connect) -> url_components`).
pub fn parse_url(buf: &[u8], is_connect: bool) -> Result<UrlComponents> {
    if buf.is_empty() {
        return Err(ErrorKind::InvalidUrl);
    }
    let mut machine = UrlMachine::new(is_connect, false);
    for (pos, &b) in buf.iter().enumerate() {
        if !machine.step(pos, b)? {
            // A space/CR/LF inside a standalone URL buffer is invalid;
            // there is nothing "after" the URL to hand it to.
            return Err(ErrorKind::InvalidUrl);
        }
    }
    machine.into_components(buf, buf.len())
}

/// Used by the message parser: finish an in-flight [`UrlMachine`] once
/// the request-line scanner has located the byte that ends the URL.
pub(crate) fn finish_inline(machine: UrlMachine, buf: &[u8], end: usize) -> Result<UrlComponents> {
    machine.into_components(buf, end)
}
