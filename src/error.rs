//! The closed, exhaustive error taxonomy (spec.md §7).
//!
//! Once a [`Parser`](crate::Parser) latches a non-`Ok` error it stays
//! latched: `execute` returns `0` on every subsequent call until the
//! parser is re-initialized. There is no recovery path.

use core::fmt;

/// Every way a message can fail to parse, plus the one non-error control
/// state (`Paused`) that shares the same field in the parser record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Not an error: parsing is proceeding normally.
    Ok,
    /// The embedder called `pause(true)`; `execute` will not advance until
    /// `pause(false)` is called.
    Paused,
    ClosedConnection,
    InvalidEofState,
    HeaderOverflow,
    InvalidVersion,
    InvalidStatus,
    InvalidMethod,
    InvalidUrl,
    InvalidHost,
    InvalidPort,
    InvalidPath,
    InvalidQueryString,
    InvalidFragment,
    LfExpected,
    InvalidHeaderToken,
    InvalidContentLength,
    UnexpectedContentLength,
    InvalidChunkSize,
    InvalidConstant,
    InvalidInternalState,
    Strict,
    CbMessageBegin,
    CbUrl,
    CbHeaderField,
    CbHeaderValue,
    CbHeadersComplete,
    CbBody,
    CbMessageComplete,
    CbStatus,
    CbChunkHeader,
    CbChunkComplete,
    Unknown,
}

impl ErrorKind {
    /// Short, stable, symbolic name (e.g. for logging or metrics), as
    /// distinct from [`ErrorKind`]'s `Display` which gives the
    /// human-readable sentence (spec.md §4.8 `error_name`/`error_description`).
    pub const fn name(self) -> &'static str {
        use ErrorKind::*;
        match self {
            Ok => "ok",
            Paused => "paused",
            ClosedConnection => "closed_connection",
            InvalidEofState => "invalid_eof_state",
            HeaderOverflow => "header_overflow",
            InvalidVersion => "invalid_version",
            InvalidStatus => "invalid_status",
            InvalidMethod => "invalid_method",
            InvalidUrl => "invalid_url",
            InvalidHost => "invalid_host",
            InvalidPort => "invalid_port",
            InvalidPath => "invalid_path",
            InvalidQueryString => "invalid_query_string",
            InvalidFragment => "invalid_fragment",
            LfExpected => "lf_expected",
            InvalidHeaderToken => "invalid_header_token",
            InvalidContentLength => "invalid_content_length",
            UnexpectedContentLength => "unexpected_content_length",
            InvalidChunkSize => "invalid_chunk_size",
            InvalidConstant => "invalid_constant",
            InvalidInternalState => "invalid_internal_state",
            Strict => "strict",
            CbMessageBegin => "cb_message_begin",
            CbUrl => "cb_url",
            CbHeaderField => "cb_header_field",
            CbHeaderValue => "cb_header_value",
            CbHeadersComplete => "cb_headers_complete",
            CbBody => "cb_body",
            CbMessageComplete => "cb_message_complete",
            CbStatus => "cb_status",
            CbChunkHeader => "cb_chunk_header",
            CbChunkComplete => "cb_chunk_complete",
            Unknown => "unknown",
        }
    }

    /// Human readable sentence, equivalent to `error_description` in the
    /// C API (spec.md §4.8). Kept as a `&'static str` rather than
    /// `self.to_string()` so it costs nothing in a `no_std`, no-`alloc`
    /// build; the text matches this type's own `Display` impl.
    pub const fn description(self) -> &'static str {
        use ErrorKind::*;
        match self {
            Ok => "success",
            Paused => "parser is paused",
            ClosedConnection => "data received after connection was closed",
            InvalidEofState => "execute() called with len == 0 in a state that cannot end here",
            HeaderOverflow => "header region exceeded the configured maximum size",
            InvalidVersion => "invalid HTTP version",
            InvalidStatus => "invalid response status",
            InvalidMethod => "invalid HTTP method",
            InvalidUrl => "invalid character in URL",
            InvalidHost => "invalid character in host",
            InvalidPort => "invalid port",
            InvalidPath => "invalid character in path",
            InvalidQueryString => "invalid character in query string",
            InvalidFragment => "invalid character in fragment",
            LfExpected => "expected LF after CR",
            InvalidHeaderToken => "invalid character in header token",
            InvalidContentLength => "invalid character in Content-Length",
            UnexpectedContentLength => {
                "Content-Length seen twice, or together with Transfer-Encoding: chunked"
            }
            InvalidChunkSize => "invalid chunk size",
            InvalidConstant => "invalid constant string (expected literal text did not match)",
            InvalidInternalState => "parser reached an internal state that should be unreachable",
            Strict => "strict mode rejected a lenient-only construct",
            CbMessageBegin => "on_message_begin callback returned an error",
            CbUrl => "on_url callback returned an error",
            CbHeaderField => "on_header_field callback returned an error",
            CbHeaderValue => "on_header_value callback returned an error",
            CbHeadersComplete => "on_headers_complete callback returned an error",
            CbBody => "on_body callback returned an error",
            CbMessageComplete => "on_message_complete callback returned an error",
            CbStatus => "on_status callback returned an error",
            CbChunkHeader => "on_chunk_header callback returned an error",
            CbChunkComplete => "on_chunk_complete callback returned an error",
            Unknown => "unknown error",
        }
    }

    #[inline]
    pub(crate) const fn is_ok(self) -> bool {
        matches!(self, ErrorKind::Ok)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorKind {}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, ErrorKind>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn name_and_description_are_distinct() {
        assert_eq!(ErrorKind::InvalidChunkSize.name(), "invalid_chunk_size");
        assert_eq!(ErrorKind::InvalidChunkSize.description(), "invalid chunk size");
    }

    #[test]
    fn ok_is_not_an_error_sentinel() {
        assert!(ErrorKind::Ok.is_ok());
        assert!(!ErrorKind::Paused.is_ok());
    }
}
