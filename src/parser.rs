//! The message state machine (spec.md §3, §4.1, §4.2, §4.6): a single
//! large byte-dispatched DFA spanning the start line, headers, and body
//! framing (identity, chunked, or EOF-delimited), re-entrant at every
//! byte across `execute` calls.
//!
//! The overall shape -- a fixed-size record threaded through repeated
//! calls, with open "marks" flushed at slice boundaries -- has no single
//! teacher file to imitate directly (`hoot` is not callback-driven), so
//! the driving idiom is spec.md §4.1/§9 translated into Rust the way
//! `hoot/src/body.rs`'s bounded-counter (`LengthChecker`) and
//! `hoot/src/chunk.rs`'s state-enum style are written: small `Copy`
//! state enums, explicit `match`, no virtual dispatch.

use log::{debug, trace};

use crate::classes::{acc_decimal, is_high_bit, is_token, lower};
use crate::error::{ErrorKind, Result};
use crate::header::{ConnectionMatcher, ContentLengthMatcher, HeaderToken, NameMatcher, TransferEncodingMatcher};
use crate::method::{Method, MethodMatcher};
use crate::settings::Settings;
use crate::url::{UrlComponents, UrlMachine};

/// Selects the parser's initial state and which framing rules
/// (`should_keep_alive`, `needs_eof`) apply (spec.md §3 `type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
    Either,
}

/// Maximum default header-region size, 80 KiB (spec.md §6 "Tunables").
pub const DEFAULT_MAX_HEADER_SIZE: u32 = 80 * 1024;

/// Sentinel for "no `Content-Length` observed" (spec.md §3).
const CONTENT_LENGTH_UNSET: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, Default)]
struct Flags(u16);

impl Flags {
    const CHUNKED: u16 = 1 << 0;
    const CONN_KEEP_ALIVE: u16 = 1 << 1;
    const CONN_CLOSE: u16 = 1 << 2;
    const CONN_UPGRADE: u16 = 1 << 3;
    const TRAILING: u16 = 1 << 4;
    const UPGRADE: u16 = 1 << 5;
    const SKIPBODY: u16 = 1 << 6;
    const CONTENT_LENGTH_SEEN: u16 = 1 << 7;

    fn has(self, bit: u16) -> bool {
        self.0 & bit != 0
    }
    fn set(&mut self, bit: u16) {
        self.0 |= bit;
    }
    fn clear_all(&mut self) {
        self.0 = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StartReq,
    StartRes,
    StartReqOrRes,
    ReqOrResAfterH,

    ReqMethod,
    ReqSpacesBeforeUrl,
    ReqUrl,
    ReqHttpSlash,
    ReqHttpT2,
    ReqHttpT1,
    ReqHttpP,
    ReqFirstHttpMajor,
    ReqHttpMajor,
    ReqFirstHttpMinor,
    ReqHttpMinor,
    ReqLineAlmostDone,

    ResHttpSlash,
    ResHttpT2,
    ResHttpT1,
    ResHttpP,
    ResFirstHttpMajor,
    ResHttpMajor,
    ResFirstHttpMinor,
    ResHttpMinor,
    ResFirstStatusCode,
    ResStatusCode,
    ResStatusStart,
    ResStatus,
    ResLineAlmostDone,

    HeaderFieldStart,
    HeaderField,
    HeaderValueDiscardWs,
    HeaderValueDiscardWsAlmostDone,
    HeaderValueDiscardLws,
    HeaderValue,
    HeaderAlmostDone,
    HeaderValueLws,
    HeadersAlmostDone,

    BodyIdentity,
    BodyIdentityEof,
    MessageDone,

    ChunkSizeStart,
    ChunkSize,
    ChunkParameters,
    ChunkSizeAlmostDone,
    ChunkData,
    ChunkDataAlmostDone,
    ChunkDataDone,

    Dead,
}

fn initial_state(t: MessageType) -> State {
    match t {
        MessageType::Request => State::StartReq,
        MessageType::Response => State::StartRes,
        MessageType::Either => State::StartReqOrRes,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkKind {
    Url,
    Status,
    HeaderField,
    HeaderValue,
    Body,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    kind: MarkKind,
    start: usize,
}

enum ValueMatcher {
    None,
    ContentLength(ContentLengthMatcher),
    TransferEncoding(TransferEncodingMatcher),
    Connection(ConnectionMatcher),
}

/// The parser record (spec.md §3): the single mutable object threaded
/// through repeated `execute` calls. `D` is an opaque embedder cookie,
/// never inspected by the parser itself.
pub struct Parser<D> {
    message_type: MessageType,
    state: State,
    name_matcher: NameMatcher,
    value_matcher: ValueMatcher,
    header_token: Option<HeaderToken>,
    method_matcher: Option<MethodMatcher>,
    url_machine: Option<UrlMachine>,
    url: Option<UrlComponents>,
    flags: Flags,
    nread: u32,
    max_header_size: u32,
    lenient: bool,
    content_length: u64,
    body_remaining: u64,
    chunk_size: u64,
    http_major: u16,
    http_minor: u16,
    status_code: u16,
    method: Option<Method>,
    upgrade: bool,
    error: ErrorKind,
    paused: bool,
    mark: Option<Mark>,
    data: D,
}

impl<D> Parser<D> {
    /// `parser_init` in spec.md §6.
    pub fn new(message_type: MessageType, data: D) -> Self {
        Parser {
            message_type,
            state: initial_state(message_type),
            name_matcher: NameMatcher::new(),
            value_matcher: ValueMatcher::None,
            header_token: None,
            method_matcher: None,
            url_machine: None,
            url: None,
            flags: Flags::default(),
            nread: 0,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            lenient: false,
            content_length: CONTENT_LENGTH_UNSET,
            body_remaining: 0,
            chunk_size: 0,
            http_major: 0,
            http_minor: 0,
            status_code: 0,
            method: None,
            upgrade: false,
            error: ErrorKind::Ok,
            paused: false,
            mark: None,
            data,
        }
    }

    /// Apply non-default tunables (spec.md §6 "Tunables").
    pub fn with_max_header_size(mut self, max: u32) -> Self {
        self.max_header_size = max;
        self
    }

    /// Enable the lenient-mode relaxations from spec.md §6 "Wire input".
    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn error(&self) -> ErrorKind {
        self.error
    }

    pub fn http_major(&self) -> u16 {
        self.http_major
    }

    pub fn http_minor(&self) -> u16 {
        self.http_minor
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn content_length(&self) -> Option<u64> {
        if self.content_length == CONTENT_LENGTH_UNSET {
            None
        } else {
            Some(self.content_length)
        }
    }

    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }

    /// The decomposed request-line URL, once the parser has read past it
    /// (spec.md §4.4). `None` for responses, or before the URL ends.
    pub fn url(&self) -> Option<&UrlComponents> {
        self.url.as_ref()
    }

    /// `pause(parser, bool)` in spec.md §4.8.
    pub fn pause(&mut self, pause: bool) {
        if !self.error.is_ok() && !matches!(self.error, ErrorKind::Paused) {
            // Programming error per spec.md §4.8; latched error wins.
            return;
        }
        self.paused = pause;
        self.error = if pause { ErrorKind::Paused } else { ErrorKind::Ok };
    }

    /// `body_is_final(parser)` in spec.md §4.8.
    pub fn body_is_final(&self) -> bool {
        self.state == State::MessageDone
    }

    /// `should_keep_alive(parser)` in spec.md §4.8.
    pub fn should_keep_alive(&self) -> bool {
        if self.needs_eof() {
            return false;
        }
        if self.http_major >= 1 && self.http_minor >= 1 {
            !self.flags.has(Flags::CONN_CLOSE)
        } else {
            self.flags.has(Flags::CONN_KEEP_ALIVE)
        }
    }

    fn needs_eof(&self) -> bool {
        if self.message_type == MessageType::Request {
            return false;
        }
        if self.flags.has(Flags::SKIPBODY) {
            return false;
        }
        if self.flags.has(Flags::CHUNKED) {
            return false;
        }
        if self.content_length != CONTENT_LENGTH_UNSET {
            return false;
        }
        if matches!(self.status_code, 100..=199 | 204 | 304) {
            return false;
        }
        true
    }

    /// `execute(parser, settings, buffer, len) -> bytes_consumed` in
    /// spec.md §4.1.
    pub fn execute(&mut self, settings: &Settings<D>, buf: &[u8]) -> usize {
        if !self.error.is_ok() {
            return 0;
        }

        if buf.is_empty() {
            return self.handle_eof(settings);
        }

        // Re-anchor any mark left open from a previous call: its data
        // starts at the beginning of this new buffer (spec.md §4.1).
        if let Some(mark) = &mut self.mark {
            mark.start = 0;
        }

        // A message that finished exactly at the previous buffer's end
        // sits in `message_done` until the next byte arrives.
        if self.state == State::MessageDone {
            self.advance_past_message_done();
        }

        let mut pos = 0usize;
        while pos < buf.len() {
            match self.step(settings, buf, pos) {
                Ok(next) => {
                    if next <= pos && self.state != State::Dead {
                        // Every branch of `step` must make progress;
                        // treat a stall as an internal-state bug rather
                        // than spin forever.
                        self.latch_error(ErrorKind::InvalidInternalState);
                        return pos;
                    }
                    pos = next;
                }
                Err(e) => {
                    self.latch_error(e);
                    return pos;
                }
            }
            if self.paused {
                return pos;
            }
            // A pipelined message may start within the same buffer right
            // after the previous one's `message_done`; `on_message_begin`
            // fires from `step_idle` once the next message's first byte
            // is actually seen, same as at the top of `execute`.
            if self.state == State::MessageDone && pos < buf.len() {
                self.advance_past_message_done();
            }
        }

        self.flush_mark(settings, buf, buf.len());
        buf.len()
    }

    fn handle_eof(&mut self, settings: &Settings<D>) -> usize {
        match self.state {
            State::BodyIdentityEof => {
                self.finish_message(settings);
                0
            }
            State::StartReq | State::StartRes | State::StartReqOrRes | State::Dead | State::MessageDone => 0,
            _ => {
                self.latch_error(ErrorKind::InvalidEofState);
                0
            }
        }
    }

    fn advance_past_message_done(&mut self) {
        self.state = if self.should_keep_alive() {
            self.reset_for_next_message();
            initial_state(self.message_type)
        } else {
            State::Dead
        };
    }

    fn reset_for_next_message(&mut self) {
        self.flags.clear_all();
        self.nread = 0;
        self.content_length = CONTENT_LENGTH_UNSET;
        self.http_major = 0;
        self.http_minor = 0;
        self.status_code = 0;
        self.method = None;
        self.upgrade = false;
        self.url = None;
    }

    fn latch_error(&mut self, e: ErrorKind) {
        debug!("parser error: {}", e.name());
        self.error = e;
        self.state = State::Dead;
    }

    fn open_mark(&mut self, kind: MarkKind, pos: usize) {
        self.mark = Some(Mark { kind, start: pos });
    }

    fn flush_mark(&mut self, settings: &Settings<D>, buf: &[u8], end: usize) -> i32 {
        let Some(mark) = self.mark else { return 0 };
        if end <= mark.start {
            return 0;
        }
        let slice = &buf[mark.start..end];
        if slice.is_empty() {
            return 0;
        }
        match mark.kind {
            MarkKind::Url => call_data(settings.on_url, self, slice),
            MarkKind::Status => call_data(settings.on_status, self, slice),
            MarkKind::HeaderField => call_data(settings.on_header_field, self, slice),
            MarkKind::HeaderValue => call_data(settings.on_header_value, self, slice),
            MarkKind::Body => call_data(settings.on_body, self, slice),
        }
    }

    fn close_mark(&mut self, settings: &Settings<D>, buf: &[u8], end: usize) -> Result<()> {
        let rc = self.flush_mark(settings, buf, end);
        self.mark = None;
        if rc != 0 {
            return Err(cb_error(self.mark_kind_before_close(buf)));
        }
        Ok(())
    }

    fn mark_kind_before_close(&self, _buf: &[u8]) -> MarkKind {
        // Best-effort: by the time this is called `self.mark` is already
        // cleared by the caller, so the error kind is derived from the
        // current parsing state instead.
        match self.state {
            State::ReqUrl => MarkKind::Url,
            State::ResStatus => MarkKind::Status,
            State::HeaderField => MarkKind::HeaderField,
            State::HeaderValue => MarkKind::HeaderValue,
            _ => MarkKind::Body,
        }
    }

    #[inline]
    fn bump_nread(&mut self) -> Result<()> {
        self.nread += 1;
        if self.nread > self.max_header_size {
            return Err(ErrorKind::HeaderOverflow);
        }
        Ok(())
    }

    fn notify(&mut self, settings: &Settings<D>, f: Option<fn(&mut Parser<D>) -> i32>, err: ErrorKind) -> Result<()> {
        if let Some(f) = f {
            if f(self) != 0 {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Dispatch exactly one step of the DFA at `buf[pos]`, returning the
    /// next cursor position (usually `pos + 1`; bulk body/value states
    /// may advance further in one step).
    fn step(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        use State::*;

        let b = buf[pos];

        // Header-region byte cap (spec.md §4.1, invariant #2).
        if matches!(
            self.state,
            StartReq
                | StartRes
                | StartReqOrRes
                | ReqOrResAfterH
                | ReqMethod
                | ReqSpacesBeforeUrl
                | ReqUrl
                | ReqHttpSlash
                | ReqHttpT2
                | ReqHttpT1
                | ReqHttpP
                | ReqFirstHttpMajor
                | ReqHttpMajor
                | ReqFirstHttpMinor
                | ReqHttpMinor
                | ReqLineAlmostDone
                | ResHttpSlash
                | ResHttpT2
                | ResHttpT1
                | ResHttpP
                | ResFirstHttpMajor
                | ResHttpMajor
                | ResFirstHttpMinor
                | ResHttpMinor
                | ResFirstStatusCode
                | ResStatusCode
                | ResStatusStart
                | ResStatus
                | ResLineAlmostDone
                | HeaderFieldStart
                | HeaderField
                | HeaderValueDiscardWs
                | HeaderValueDiscardWsAlmostDone
                | HeaderValueDiscardLws
                | HeaderValue
                | HeaderAlmostDone
                | HeaderValueLws
                | HeadersAlmostDone
        ) {
            self.bump_nread()?;
        }

        match self.state {
            StartReq | StartRes | StartReqOrRes => self.step_idle(settings, b, pos),
            ReqOrResAfterH => self.step_req_or_res_after_h(b),

            ReqMethod => self.step_req_method(b),
            ReqSpacesBeforeUrl => return self.step_req_spaces_before_url(settings, buf, pos),
            ReqUrl => return self.step_req_url(settings, buf, pos),
            ReqHttpSlash => expect(b, b'/', ReqFirstHttpMajor).map(|s| self.set(s)),
            ReqHttpT2 => expect(b, b'T', ReqHttpT1).map(|s| self.set(s)),
            ReqHttpT1 => expect(b, b'T', ReqHttpP).map(|s| self.set(s)),
            ReqHttpP => expect(b, b'P', ReqHttpSlash).map(|s| self.set(s)),
            ReqFirstHttpMajor => self.step_first_version_digit(b, ReqHttpMajor, true),
            ReqHttpMajor => self.step_version_digit(b, ReqFirstHttpMinor, None, true),
            ReqFirstHttpMinor => self.step_first_version_digit(b, ReqHttpMinor, false),
            ReqHttpMinor => self.step_req_http_minor(b),
            ReqLineAlmostDone => expect(b, b'\n', HeaderFieldStart).map(|s| self.set(s)),

            ResHttpSlash => expect(b, b'/', ResFirstHttpMajor).map(|s| self.set(s)),
            ResHttpT2 => expect(b, b'T', ResHttpT1).map(|s| self.set(s)),
            ResHttpT1 => expect(b, b'T', ResHttpP).map(|s| self.set(s)),
            ResHttpP => expect(b, b'P', ResHttpSlash).map(|s| self.set(s)),
            ResFirstHttpMajor => self.step_first_version_digit(b, ResHttpMajor, true),
            ResHttpMajor => self.step_version_digit(b, ResFirstHttpMinor, None, true),
            ResFirstHttpMinor => self.step_first_version_digit(b, ResHttpMinor, false),
            ResHttpMinor => self.step_res_http_minor(b),
            ResFirstStatusCode => self.step_res_first_status_code(b),
            ResStatusCode => self.step_res_status_code(b),
            ResStatusStart => {
                self.open_mark(MarkKind::Status, pos);
                self.state = ResStatus;
                return self.step(settings, buf, pos);
            }
            ResStatus => return self.step_res_status(settings, buf, pos),
            ResLineAlmostDone => expect(b, b'\n', HeaderFieldStart).map(|s| self.set(s)),

            HeaderFieldStart => return self.step_header_field_start(settings, buf, pos),
            HeaderField => return self.step_header_field(settings, buf, pos),
            HeaderValueDiscardWs => return self.step_header_value_discard_ws(settings, buf, pos),
            HeaderValueDiscardWsAlmostDone => {
                expect(b, b'\n', HeaderValueDiscardLws).map(|s| self.set(s))
            }
            HeaderValueDiscardLws => return self.step_header_value_discard_lws(settings, buf, pos),
            HeaderValue => return self.step_header_value(settings, buf, pos),
            HeaderAlmostDone => expect(b, b'\n', HeaderValueLws).map(|s| self.set(s)),
            HeaderValueLws => return self.step_header_value_lws(settings, buf, pos),
            HeadersAlmostDone => {
                if b != b'\n' {
                    return Err(ErrorKind::LfExpected);
                }
                self.finish_headers(settings)?;
                return Ok(pos + 1);
            }

            BodyIdentity => return self.step_body_identity(settings, buf, pos),
            BodyIdentityEof => return self.step_body_identity_eof(settings, buf, pos),
            MessageDone => unreachable!("advance_past_message_done runs before step"),

            ChunkSizeStart => self.step_chunk_size_start(b),
            ChunkSize => self.step_chunk_size(b),
            ChunkParameters => {
                if b == b'\r' {
                    Ok(ChunkSizeAlmostDone)
                } else {
                    Ok(ChunkParameters)
                }
            }
            ChunkSizeAlmostDone => return self.step_chunk_size_almost_done(settings, b, pos),
            ChunkData => return self.step_chunk_data(settings, buf, pos),
            ChunkDataAlmostDone => expect(b, b'\r', ChunkDataDone).map(|s| self.set(s)),
            ChunkDataDone => self.step_chunk_data_done(settings, b),

            Dead => {
                if matches!(b, b'\r' | b'\n') {
                    Ok(Dead)
                } else {
                    Err(ErrorKind::ClosedConnection)
                }
            }
        }
        .map(|_| pos + 1)
    }

    fn set(&mut self, s: State) -> State {
        self.state = s;
        s
    }

    fn begin_message(&mut self, settings: &Settings<D>) -> Result<()> {
        trace!("message begin");
        self.reset_for_next_message();
        self.notify(settings, settings.on_message_begin, ErrorKind::CbMessageBegin)
    }

    fn step_idle(&mut self, settings: &Settings<D>, b: u8, _pos: usize) -> Result<State> {
        use State::*;
        if matches!(b, b'\r' | b'\n') {
            return Ok(self.state);
        }
        match self.state {
            StartReq => {
                self.begin_message(settings)?;
                self.method_matcher = Some(MethodMatcher::start(b)?);
                Ok(ReqMethod)
            }
            StartRes => {
                if b != b'H' {
                    return Err(ErrorKind::InvalidConstant);
                }
                self.begin_message(settings)?;
                Ok(ResHttpT2)
            }
            StartReqOrRes => {
                if b == b'H' {
                    self.begin_message(settings)?;
                    Ok(ReqOrResAfterH)
                } else {
                    self.begin_message(settings)?;
                    self.method_matcher = Some(MethodMatcher::start(b)?);
                    Ok(ReqMethod)
                }
            }
            _ => unreachable!(),
        }
    }

    fn step_req_or_res_after_h(&mut self, b: u8) -> Result<State> {
        if b == b'T' {
            Ok(State::ResHttpT1)
        } else {
            let mut m = MethodMatcher::start(b'H')?;
            m.advance(b)?;
            self.method_matcher = Some(m);
            Ok(State::ReqMethod)
        }
    }

    fn step_req_method(&mut self, b: u8) -> Result<State> {
        if b == b' ' {
            let m = self.method_matcher.take().expect("method matcher set");
            self.method = Some(m.finish()?);
            self.url_machine = Some(UrlMachine::new(
                self.method == Some(Method::Connect),
                self.lenient,
            ));
            return Ok(State::ReqSpacesBeforeUrl);
        }
        self.method_matcher
            .as_mut()
            .expect("method matcher set")
            .advance(b)?;
        Ok(State::ReqMethod)
    }

    fn step_req_spaces_before_url(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        if b == b' ' {
            return Ok(pos + 1);
        }
        self.open_mark(MarkKind::Url, pos);
        self.state = State::ReqUrl;
        self.step_req_url(settings, buf, pos)
    }

    fn step_req_url(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        let machine = self.url_machine.as_mut().expect("url machine active");
        let consumed = machine.step(pos, b)?;
        if consumed {
            return Ok(pos + 1);
        }
        // URL ended; this byte belongs to the space/CR/LF after it.
        self.close_mark(settings, buf, pos)?;
        let machine = self.url_machine.take().expect("url machine active");
        self.url = Some(crate::url::finish_inline(machine, buf, pos)?);
        match b {
            b' ' => Ok(self.advance(State::ReqHttpT2, pos)),
            b'\r' | b'\n' if self.lenient => {
                // No-version HTTP/0.9-style request line; treat version
                // as 0.9 and fall straight through to headers.
                self.http_major = 0;
                self.http_minor = 9;
                Ok(self.advance(State::HeaderFieldStart, pos))
            }
            _ => Err(ErrorKind::InvalidUrl),
        }
    }

    fn advance(&mut self, s: State, pos: usize) -> usize {
        self.state = s;
        pos + 1
    }

    fn step_first_version_digit(&mut self, b: u8, next: State, major: bool) -> Result<State> {
        if !b.is_ascii_digit() {
            return Err(ErrorKind::InvalidVersion);
        }
        let digit = b - b'0';
        if major {
            self.http_major = digit as u16;
        } else {
            self.http_minor = digit as u16;
        }
        Ok(next)
    }

    fn step_version_digit(&mut self, b: u8, on_dot: State, _unused: Option<State>, major: bool) -> Result<State> {
        if b.is_ascii_digit() {
            let digit = b - b'0';
            let cur = if major { self.http_major } else { self.http_minor } as u64;
            let next = acc_decimal(cur, digit, 999).ok_or(ErrorKind::InvalidVersion)?;
            if major {
                self.http_major = next as u16;
            } else {
                self.http_minor = next as u16;
            }
            return Ok(if major { State::ReqHttpMajor } else { State::ReqHttpMinor });
        }
        if b == b'.' {
            return Ok(on_dot);
        }
        Err(ErrorKind::InvalidVersion)
    }

    fn step_req_http_minor(&mut self, b: u8) -> Result<State> {
        if b.is_ascii_digit() {
            let digit = b - b'0';
            self.http_minor = acc_decimal(self.http_minor as u64, digit, 999)
                .ok_or(ErrorKind::InvalidVersion)? as u16;
            return Ok(State::ReqHttpMinor);
        }
        match b {
            b'\r' => Ok(State::ReqLineAlmostDone),
            b'\n' if self.lenient => Ok(State::HeaderFieldStart),
            _ => Err(ErrorKind::InvalidVersion),
        }
    }

    fn step_res_http_minor(&mut self, b: u8) -> Result<State> {
        if b.is_ascii_digit() {
            let digit = b - b'0';
            self.http_minor = acc_decimal(self.http_minor as u64, digit, 999)
                .ok_or(ErrorKind::InvalidVersion)? as u16;
            return Ok(State::ResHttpMinor);
        }
        if b == b' ' {
            return Ok(State::ResFirstStatusCode);
        }
        Err(ErrorKind::InvalidVersion)
    }

    fn step_res_first_status_code(&mut self, b: u8) -> Result<State> {
        // Open question resolved (spec.md §9): accept a leading space
        // before the first status digit.
        if b == b' ' {
            return Ok(State::ResFirstStatusCode);
        }
        if !b.is_ascii_digit() {
            return Err(ErrorKind::InvalidStatus);
        }
        self.status_code = (b - b'0') as u16;
        Ok(State::ResStatusCode)
    }

    fn step_res_status_code(&mut self, b: u8) -> Result<State> {
        if b.is_ascii_digit() {
            let digit = b - b'0';
            self.status_code =
                acc_decimal(self.status_code as u64, digit, 999).ok_or(ErrorKind::InvalidStatus)? as u16;
            return Ok(State::ResStatusCode);
        }
        match b {
            b' ' => Ok(State::ResStatusStart),
            b'\r' => Ok(State::ResLineAlmostDone),
            b'\n' if self.lenient => Ok(State::HeaderFieldStart),
            _ => Err(ErrorKind::InvalidStatus),
        }
    }

    fn step_res_status(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        match b {
            b'\r' => {
                self.close_mark(settings, buf, pos)?;
                Ok(self.advance(State::ResLineAlmostDone, pos))
            }
            b'\n' if self.lenient => {
                self.close_mark(settings, buf, pos)?;
                Ok(self.advance(State::HeaderFieldStart, pos))
            }
            _ => Ok(pos + 1),
        }
    }

    fn step_header_field_start(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        match b {
            b'\r' => Ok(self.advance(State::HeadersAlmostDone, pos)),
            b'\n' if self.lenient => {
                self.finish_headers(settings)?;
                Ok(pos + 1)
            }
            _ => {
                if !is_token(b) && !(self.lenient && b == b' ') {
                    return Err(ErrorKind::InvalidHeaderToken);
                }
                self.name_matcher = NameMatcher::new();
                self.name_matcher.push(lower(b));
                self.open_mark(MarkKind::HeaderField, pos);
                Ok(self.advance(State::HeaderField, pos))
            }
        }
    }

    fn step_header_field(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        if b == b':' {
            self.close_mark(settings, buf, pos)?;
            self.header_token = self.name_matcher.finish();
            self.value_matcher = match self.header_token {
                Some(HeaderToken::ContentLength) => ValueMatcher::ContentLength(ContentLengthMatcher::new()),
                Some(HeaderToken::TransferEncoding) => {
                    ValueMatcher::TransferEncoding(TransferEncodingMatcher::new())
                }
                Some(HeaderToken::Connection) | Some(HeaderToken::ProxyConnection) => {
                    ValueMatcher::Connection(ConnectionMatcher::new())
                }
                _ => ValueMatcher::None,
            };
            return Ok(self.advance(State::HeaderValueDiscardWs, pos));
        }
        if matches!(b, b'\r' | b'\n') {
            return Err(ErrorKind::InvalidHeaderToken);
        }
        if !is_token(b) && !(self.lenient && b == b' ') {
            return Err(ErrorKind::InvalidHeaderToken);
        }
        self.name_matcher.push(lower(b));
        Ok(pos + 1)
    }

    fn step_header_value_discard_ws(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        match b {
            b' ' | b'\t' => Ok(pos + 1),
            b'\r' => Ok(self.advance(State::HeaderValueDiscardWsAlmostDone, pos)),
            b'\n' if self.lenient => Ok(self.advance(State::HeaderValueDiscardLws, pos)),
            _ => {
                self.open_mark(MarkKind::HeaderValue, pos);
                self.state = State::HeaderValue;
                self.step_header_value(settings, buf, pos)
            }
        }
    }

    fn step_header_value_discard_lws(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        if matches!(b, b' ' | b'\t') {
            return Ok(self.advance(State::HeaderValueDiscardWs, pos));
        }
        // Empty value, no folding: commit (nothing to apply) and
        // re-process this byte as the start of the next header or of
        // the blank line ending the section.
        self.commit_header_value(settings)?;
        self.state = State::HeaderFieldStart;
        self.step_header_field_start(settings, buf, pos)
    }

    fn step_header_value(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        // Fast path for general headers: scan straight to the next
        // CR/LF instead of dispatching byte by byte (spec.md §4.5).
        if matches!(self.value_matcher, ValueMatcher::None) {
            let rest = &buf[pos..];
            let end = rest
                .iter()
                .position(|&c| c == b'\r' || c == b'\n')
                .unwrap_or(rest.len());
            for &c in &rest[..end] {
                if !self.lenient && c < 0x20 && c != b'\t' {
                    return Err(ErrorKind::InvalidHeaderToken);
                }
                if !self.lenient && is_high_bit(c) {
                    return Err(ErrorKind::Strict);
                }
            }
            // `buf[pos]` itself was already counted by the dispatcher's
            // per-byte `bump_nread` before this fast path ran.
            if end > 1 {
                self.bump_nread_by(end - 1)?;
            }
            let new_pos = pos + end;
            if end == rest.len() {
                return Ok(new_pos);
            }
            // A bare LF (no preceding CR) is a lenient-only relaxation;
            // CR always proceeds (the next state expects the matching LF).
            if rest[end] == b'\n' && !self.lenient {
                return Err(ErrorKind::Strict);
            }
            return self.finish_header_value_line(settings, buf, new_pos);
        }

        let b = buf[pos];
        if b == b'\r' {
            return self.finish_header_value_line(settings, buf, pos);
        }
        if b == b'\n' {
            if self.lenient {
                return self.finish_header_value_line(settings, buf, pos);
            }
            return Err(ErrorKind::Strict);
        }
        if !self.lenient && b < 0x20 && b != b'\t' {
            return Err(ErrorKind::InvalidHeaderToken);
        }
        if !self.lenient && is_high_bit(b) {
            return Err(ErrorKind::Strict);
        }
        match &mut self.value_matcher {
            ValueMatcher::ContentLength(m) => m.push(b)?,
            ValueMatcher::TransferEncoding(m) => m.push(b),
            ValueMatcher::Connection(m) => m.push(b),
            ValueMatcher::None => unreachable!(),
        }
        Ok(pos + 1)
    }

    fn bump_nread_by(&mut self, n: usize) -> Result<()> {
        self.nread += n as u32;
        if self.nread > self.max_header_size {
            return Err(ErrorKind::HeaderOverflow);
        }
        Ok(())
    }

    fn finish_header_value_line(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        let rc = self.flush_mark(settings, buf, pos);
        self.mark = None;
        if rc != 0 {
            return Err(ErrorKind::CbHeaderValue);
        }
        match b {
            b'\r' => Ok(self.advance(State::HeaderAlmostDone, pos)),
            b'\n' if self.lenient => {
                self.commit_header_value(settings)?;
                Ok(self.advance(State::HeaderFieldStart, pos))
            }
            _ => unreachable!("caller only dispatches here on CR or lenient LF"),
        }
    }

    fn step_header_value_lws(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let b = buf[pos];
        if matches!(b, b' ' | b'\t') {
            self.open_mark(MarkKind::HeaderValue, pos);
            return Ok(self.advance(State::HeaderValue, pos));
        }
        self.commit_header_value(settings)?;
        self.state = State::HeaderFieldStart;
        self.step_header_field_start(settings, buf, pos)
    }

    /// Apply whichever [`ValueMatcher`] was active for this header,
    /// updating flags/`content_length`, once folding is ruled out.
    fn commit_header_value(&mut self, _settings: &Settings<D>) -> Result<()> {
        let matcher = core::mem::replace(&mut self.value_matcher, ValueMatcher::None);
        match matcher {
            ValueMatcher::None => {}
            ValueMatcher::ContentLength(m) => {
                if self.flags.has(Flags::CONTENT_LENGTH_SEEN) {
                    return Err(ErrorKind::UnexpectedContentLength);
                }
                self.content_length = m.finish()?;
                self.flags.set(Flags::CONTENT_LENGTH_SEEN);
            }
            ValueMatcher::TransferEncoding(m) => {
                if m.is_chunked() {
                    self.flags.set(Flags::CHUNKED);
                }
            }
            ValueMatcher::Connection(m) => {
                let f = m.finish();
                if f.keep_alive {
                    self.flags.set(Flags::CONN_KEEP_ALIVE);
                }
                if f.close {
                    self.flags.set(Flags::CONN_CLOSE);
                }
                if f.upgrade {
                    self.flags.set(Flags::CONN_UPGRADE);
                }
            }
        }
        if matches!(self.header_token, Some(HeaderToken::Upgrade)) {
            self.flags.set(Flags::UPGRADE);
        }
        Ok(())
    }

    fn finish_headers(&mut self, settings: &Settings<D>) -> Result<()> {
        if self.flags.has(Flags::TRAILING) {
            self.notify(settings, settings.on_chunk_complete, ErrorKind::CbChunkComplete)?;
            return self.finish_message(settings);
        }

        // Framing-exclusivity (spec.md §8 testable property).
        if self.flags.has(Flags::CHUNKED) && self.flags.has(Flags::CONTENT_LENGTH_SEEN) {
            return Err(ErrorKind::UnexpectedContentLength);
        }

        if self.flags.has(Flags::CONN_UPGRADE) || self.method == Some(Method::Connect) {
            self.upgrade = true;
        }

        let rc = call_notify(settings.on_headers_complete, self);
        if rc < 0 {
            return Err(ErrorKind::CbHeadersComplete);
        }
        if rc == 2 {
            self.upgrade = true;
        }
        let skip_body = rc >= 1;

        if self.upgrade {
            self.finish_message(settings)?;
            return Ok(());
        }

        if skip_body || self.method == Some(Method::Head) {
            self.finish_message(settings)?;
            return Ok(());
        }

        if self.flags.has(Flags::CHUNKED) {
            self.nread = 0;
            self.state = State::ChunkSizeStart;
            return Ok(());
        }

        if self.content_length != CONTENT_LENGTH_UNSET {
            self.body_remaining = self.content_length;
            if self.body_remaining == 0 {
                self.finish_message(settings)?;
            } else {
                self.state = State::BodyIdentity;
            }
            return Ok(());
        }

        if self.needs_eof() {
            self.state = State::BodyIdentityEof;
            return Ok(());
        }

        self.finish_message(settings)?;
        Ok(())
    }

    fn step_body_identity(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let avail = (buf.len() - pos) as u64;
        let take = avail.min(self.body_remaining) as usize;
        if take > 0 {
            let rc = call_data(settings.on_body, self, &buf[pos..pos + take]);
            if rc != 0 {
                return Err(ErrorKind::CbBody);
            }
        }
        self.body_remaining -= take as u64;
        let new_pos = pos + take;
        if self.body_remaining == 0 {
            self.finish_message(settings)?;
        }
        Ok(new_pos)
    }

    fn step_body_identity_eof(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let rc = call_data(settings.on_body, self, &buf[pos..]);
        if rc != 0 {
            return Err(ErrorKind::CbBody);
        }
        Ok(buf.len())
    }

    fn step_chunk_size_start(&mut self, b: u8) -> Result<State> {
        let Some(digit) = crate::classes::hex_value(b) else {
            return Err(ErrorKind::InvalidChunkSize);
        };
        self.chunk_size = digit as u64;
        Ok(State::ChunkSize)
    }

    fn step_chunk_size(&mut self, b: u8) -> Result<State> {
        if let Some(digit) = crate::classes::hex_value(b) {
            self.chunk_size = acc_decimal_hex(self.chunk_size, digit)?;
            return Ok(State::ChunkSize);
        }
        match b {
            b';' => Ok(State::ChunkParameters),
            b'\r' => Ok(State::ChunkSizeAlmostDone),
            _ => Err(ErrorKind::InvalidChunkSize),
        }
    }

    fn step_chunk_size_almost_done(&mut self, settings: &Settings<D>, b: u8, pos: usize) -> Result<usize> {
        if b != b'\n' {
            return Err(ErrorKind::LfExpected);
        }
        self.nread = 0;
        if self.chunk_size == 0 {
            self.flags.set(Flags::TRAILING);
            self.state = State::HeaderFieldStart;
        } else {
            self.notify(settings, settings.on_chunk_header, ErrorKind::CbChunkHeader)?;
            self.body_remaining = self.chunk_size;
            self.state = State::ChunkData;
        }
        Ok(pos + 1)
    }

    fn step_chunk_data(&mut self, settings: &Settings<D>, buf: &[u8], pos: usize) -> Result<usize> {
        let avail = (buf.len() - pos) as u64;
        let take = avail.min(self.body_remaining) as usize;
        if take > 0 {
            let rc = call_data(settings.on_body, self, &buf[pos..pos + take]);
            if rc != 0 {
                return Err(ErrorKind::CbBody);
            }
        }
        self.body_remaining -= take as u64;
        let new_pos = pos + take;
        if self.body_remaining == 0 {
            self.state = State::ChunkDataAlmostDone;
        }
        Ok(new_pos)
    }

    fn step_chunk_data_done(&mut self, settings: &Settings<D>, b: u8) -> Result<State> {
        if b != b'\n' {
            return Err(ErrorKind::LfExpected);
        }
        let rc = call_notify(settings.on_chunk_complete, self);
        if rc != 0 {
            return Err(ErrorKind::CbChunkComplete);
        }
        Ok(State::ChunkSizeStart)
    }

    fn finish_message(&mut self, settings: &Settings<D>) -> Result<()> {
        trace!("message complete");
        let rc = call_notify(settings.on_message_complete, self);
        if rc != 0 {
            return Err(ErrorKind::CbMessageComplete);
        }
        self.state = State::MessageDone;
        Ok(())
    }
}

fn expect(actual: u8, expected: u8, next: State) -> Result<State> {
    if actual == expected {
        Ok(next)
    } else {
        Err(ErrorKind::InvalidConstant)
    }
}

fn acc_decimal_hex(acc: u64, digit: u8) -> Result<u64> {
    if acc > u64::MAX / 16 {
        return Err(ErrorKind::InvalidChunkSize);
    }
    let acc = acc * 16;
    let digit = digit as u64;
    if acc > u64::MAX - digit {
        return Err(ErrorKind::InvalidChunkSize);
    }
    Ok(acc + digit)
}

fn call_notify<D>(f: Option<fn(&mut Parser<D>) -> i32>, parser: &mut Parser<D>) -> i32 {
    match f {
        Some(f) => f(parser),
        None => 0,
    }
}

fn call_data<D>(f: Option<fn(&mut Parser<D>, &[u8]) -> i32>, parser: &mut Parser<D>, slice: &[u8]) -> i32 {
    match f {
        Some(f) => f(parser, slice),
        None => 0,
    }
}

fn cb_error(kind: MarkKind) -> ErrorKind {
    match kind {
        MarkKind::Url => ErrorKind::CbUrl,
        MarkKind::Status => ErrorKind::CbStatus,
        MarkKind::HeaderField => ErrorKind::CbHeaderField,
        MarkKind::HeaderValue => ErrorKind::CbHeaderValue,
        MarkKind::Body => ErrorKind::CbBody,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::Settings;

    #[derive(Default)]
    struct Collected {
        method: Option<Method>,
        url: alloc_free_vec::Buf,
        headers: alloc_free_vec::Buf,
        body: alloc_free_vec::Buf,
        message_complete: u32,
        headers_complete: u32,
    }

    mod alloc_free_vec {
        // A fixed-capacity accumulator so tests stay `no_std`/no-`alloc`.
        pub struct Buf {
            data: [u8; 512],
            len: usize,
        }
        impl Default for Buf {
            fn default() -> Self {
                Buf { data: [0; 512], len: 0 }
            }
        }
        impl Buf {
            pub fn extend(&mut self, s: &[u8]) {
                let end = (self.len + s.len()).min(self.data.len());
                let n = end - self.len;
                self.data[self.len..end].copy_from_slice(&s[..n]);
                self.len = end;
            }
            pub fn as_slice(&self) -> &[u8] {
                &self.data[..self.len]
            }
        }
    }

    fn on_url(p: &mut Parser<Collected>, s: &[u8]) -> i32 {
        p.data_mut().url.extend(s);
        0
    }
    fn on_header_value(p: &mut Parser<Collected>, s: &[u8]) -> i32 {
        p.data_mut().headers.extend(s);
        0
    }
    fn on_body(p: &mut Parser<Collected>, s: &[u8]) -> i32 {
        p.data_mut().body.extend(s);
        0
    }
    fn on_headers_complete(p: &mut Parser<Collected>) -> i32 {
        p.data_mut().headers_complete += 1;
        0
    }
    fn on_message_complete(p: &mut Parser<Collected>) -> i32 {
        p.data_mut().message_complete += 1;
        0
    }

    fn settings() -> Settings<Collected> {
        Settings {
            on_url: Some(on_url),
            on_header_value: Some(on_header_value),
            on_body: Some(on_body),
            on_headers_complete: Some(on_headers_complete),
            on_message_complete: Some(on_message_complete),
            ..Settings::default()
        }
    }

    #[test]
    fn simple_get() {
        let input = b"GET /test HTTP/1.1\r\nUser-Agent: curl/7.18.0\r\nHost: 0.0.0.0:5000\r\nAccept: */*\r\n\r\n";
        let mut p = Parser::new(MessageType::Request, Collected::default());
        let s = settings();
        let consumed = p.execute(&s, input);
        assert_eq!(consumed, input.len());
        assert_eq!(p.method(), Some(Method::Get));
        assert_eq!(p.data().url.as_slice(), b"/test");
        assert_eq!(p.data().headers_complete, 1);
        assert_eq!(p.data().message_complete, 1);
        assert!(p.should_keep_alive());
    }

    #[test]
    fn funky_cased_content_length_with_identity_body() {
        let input = b"GET /path HTTP/1.0\r\nconTENT-Length: 5\r\n\r\nHELLO";
        let mut p = Parser::new(MessageType::Request, Collected::default());
        let s = settings();
        let consumed = p.execute(&s, input);
        assert_eq!(consumed, input.len());
        assert_eq!(p.data().body.as_slice(), b"HELLO");
        assert!(!p.should_keep_alive());
    }

    #[test]
    fn chunked_with_trailers() {
        let input = b"POST /p HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\nVary: *\r\nContent-Type: text/plain\r\n\r\n";
        let mut p = Parser::new(MessageType::Request, Collected::default());
        let s = settings();
        let consumed = p.execute(&s, input);
        assert_eq!(consumed, input.len());
        assert_eq!(p.data().body.as_slice(), b"hello world");
        assert_eq!(p.data().message_complete, 1);
    }

    #[test]
    fn conflicting_framing_is_an_error() {
        let input = b"POST / HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\nhello";
        let mut p = Parser::new(MessageType::Request, Collected::default());
        let s = settings();
        p.execute(&s, input);
        assert_eq!(p.error(), ErrorKind::UnexpectedContentLength);
    }

    #[test]
    fn malformed_start_line_is_invalid_constant() {
        let input = b"GET / HTP/1.1\r\n\r\n";
        let mut p = Parser::new(MessageType::Request, Collected::default());
        let s = settings();
        p.execute(&s, input);
        assert_eq!(p.error(), ErrorKind::InvalidConstant);
    }

    #[test]
    fn bare_lf_header_value_is_strict_error_not_panic() {
        let input: &[u8] = b"GET / HTTP/1.1\r\nFoo: bar\n\r\n";
        let mut p = Parser::new(MessageType::Request, Collected::default());
        let s = settings();
        p.execute(&s, input);
        assert_eq!(p.error(), ErrorKind::Strict);
    }

    #[test]
    fn bare_lf_header_value_accepted_when_lenient() {
        let input: &[u8] = b"GET / HTTP/1.1\r\nFoo: bar\n\r\n";
        let mut p = Parser::new(MessageType::Request, Collected::default()).with_lenient(true);
        let s = settings();
        let consumed = p.execute(&s, input);
        assert_eq!(consumed, input.len());
        assert_eq!(p.error(), ErrorKind::Ok);
    }

    #[test]
    fn high_bit_header_value_byte_is_strict_error() {
        let input: &[u8] = b"GET / HTTP/1.1\r\nFoo: b\xffr\r\n\r\n";
        let mut p = Parser::new(MessageType::Request, Collected::default());
        let s = settings();
        p.execute(&s, input);
        assert_eq!(p.error(), ErrorKind::Strict);
    }

    #[test]
    fn high_bit_header_value_byte_accepted_when_lenient() {
        let input: &[u8] = b"GET / HTTP/1.1\r\nFoo: b\xffr\r\n\r\n";
        let mut p = Parser::new(MessageType::Request, Collected::default()).with_lenient(true);
        let s = settings();
        let consumed = p.execute(&s, input);
        assert_eq!(consumed, input.len());
        assert_eq!(p.error(), ErrorKind::Ok);
    }

    #[test]
    fn high_bit_byte_in_typed_header_value_is_strict_error() {
        // "Connection" routes through the typed `ConnectionMatcher` path
        // (the byte-by-byte slow path), unlike the general-header fast
        // path exercised above.
        let input: &[u8] = b"GET / HTTP/1.1\r\nConnection: \xffclose\r\n\r\n";
        let mut p = Parser::new(MessageType::Request, Collected::default());
        let s = settings();
        p.execute(&s, input);
        assert_eq!(p.error(), ErrorKind::Strict);
    }

    #[test]
    fn split_anywhere_yields_same_result() {
        let input: &[u8] = b"GET /test HTTP/1.1\r\nUser-Agent: x\r\nHost: h\r\n\r\n";
        for split in 1..input.len() {
            let mut p = Parser::new(MessageType::Request, Collected::default());
            let s = settings();
            let a = p.execute(&s, &input[..split]);
            assert_eq!(a, split, "first half should be fully consumed at split {split}");
            let b = p.execute(&s, &input[split..]);
            assert_eq!(a + b, input.len());
            assert_eq!(p.data().message_complete, 1);
        }
    }
}
