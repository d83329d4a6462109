//! The callback table (spec.md §3 "Settings"): a read-only set of
//! function pointers, kept separate from [`crate::Parser`] so one
//! `Settings` can drive many parsers. Grounded on `http_parser_settings`
//! in `original_source/http_parser.h`; there is no direct teacher
//! equivalent since `hoot` is not callback-driven, so the shape here
//! follows the original C struct translated into idiomatic fn-pointer
//! fields, the way the teacher's own `Settings`-free modules still favor
//! plain function items over boxed closures to stay allocation-free.

use crate::Parser;

/// `on_message_begin`, `on_headers_complete`, `on_message_complete`,
/// `on_chunk_header`, `on_chunk_complete`: callbacks that carry no data,
/// only the parser handle.
pub type NotifyFn<D> = fn(&mut Parser<D>) -> i32;

/// `on_url`, `on_status`, `on_header_field`, `on_header_value`,
/// `on_body`: callbacks that carry a borrowed slice into the buffer
/// passed to the current `execute` call.
pub type DataFn<D> = fn(&mut Parser<D>, &[u8]) -> i32;

/// Callback table. `D` is the embedder's opaque cookie type, stored on
/// [`Parser`] and threaded through to every callback via `parser.data()`/
/// `parser.data_mut()`. Missing callbacks (`None`) are silently skipped.
pub struct Settings<D> {
    pub on_message_begin: Option<NotifyFn<D>>,
    pub on_url: Option<DataFn<D>>,
    pub on_status: Option<DataFn<D>>,
    pub on_header_field: Option<DataFn<D>>,
    pub on_header_value: Option<DataFn<D>>,
    /// Trinary return convention (spec.md §4.1): `0` continue with body,
    /// `1` message has no body, `2` same as `1` plus force `upgrade`.
    pub on_headers_complete: Option<NotifyFn<D>>,
    pub on_body: Option<DataFn<D>>,
    pub on_message_complete: Option<NotifyFn<D>>,
    pub on_chunk_header: Option<NotifyFn<D>>,
    pub on_chunk_complete: Option<NotifyFn<D>>,
}

impl<D> Default for Settings<D> {
    fn default() -> Self {
        Settings {
            on_message_begin: None,
            on_url: None,
            on_status: None,
            on_header_field: None,
            on_header_value: None,
            on_headers_complete: None,
            on_body: None,
            on_message_complete: None,
            on_chunk_header: None,
            on_chunk_complete: None,
        }
    }
}

impl<D> Settings<D> {
    /// `settings_init` in spec.md §6: every callback defaults to absent.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_to_all_missing() {
        let s: Settings<()> = Settings::new();
        assert!(s.on_message_begin.is_none());
        assert!(s.on_body.is_none());
        assert!(s.on_chunk_complete.is_none());
    }
}
