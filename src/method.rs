//! The HTTP method table and its ambiguous-prefix discriminator
//! (spec.md §4.3).

use crate::error::{ErrorKind, Result};

/// Every request method the parser recognizes. Mirrors the method set in
/// spec.md §4.3 (the webdav/subversion/upnp extended set, not just the
/// handful in the original source's oldest snapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Method {
    Delete,
    Get,
    Head,
    Post,
    Put,
    Connect,
    Options,
    Trace,
    Copy,
    Lock,
    MkCol,
    Move,
    PropFind,
    PropPatch,
    Search,
    Unlock,
    Bind,
    Rebind,
    Unbind,
    Acl,
    Report,
    MkActivity,
    Checkout,
    Merge,
    MSearch,
    Notify,
    Subscribe,
    Unsubscribe,
    Patch,
    Purge,
    MkCalendar,
    Link,
    Unlink,
    Source,
}

impl Method {
    /// String literal for the method, as `method_name` in spec.md §4.8.
    pub const fn name(self) -> &'static str {
        use Method::*;
        match self {
            Delete => "DELETE",
            Get => "GET",
            Head => "HEAD",
            Post => "POST",
            Put => "PUT",
            Connect => "CONNECT",
            Options => "OPTIONS",
            Trace => "TRACE",
            Copy => "COPY",
            Lock => "LOCK",
            MkCol => "MKCOL",
            Move => "MOVE",
            PropFind => "PROPFIND",
            PropPatch => "PROPPATCH",
            Search => "SEARCH",
            Unlock => "UNLOCK",
            Bind => "BIND",
            Rebind => "REBIND",
            Unbind => "UNBIND",
            Acl => "ACL",
            Report => "REPORT",
            MkActivity => "MKACTIVITY",
            Checkout => "CHECKOUT",
            Merge => "MERGE",
            MSearch => "M-SEARCH",
            Notify => "NOTIFY",
            Subscribe => "SUBSCRIBE",
            Unsubscribe => "UNSUBSCRIBE",
            Patch => "PATCH",
            Purge => "PURGE",
            MkCalendar => "MKCALENDAR",
            Link => "LINK",
            Unlink => "UNLINK",
            Source => "SOURCE",
        }
    }

    #[inline]
    pub const fn is_connect(self) -> bool {
        matches!(self, Method::Connect)
    }
}

/// Free function form of [`Method::name`], matching spec.md §6's
/// `method_name(method) -> string literal`.
pub const fn method_name(method: Method) -> &'static str {
    method.name()
}

/// Incremental method matcher.
///
/// The request line is read one byte at a time; on the first byte we pick
/// every method whose name starts with that byte as a still-viable
/// candidate set, represented compactly as a single tentative `Method`
/// plus an index into its name. Subsequent bytes either continue to match
/// the tentative candidate's name, or -- for the handful of ambiguous
/// first letters (`P`, `M`, `U`, ...) -- switch the tentative candidate to
/// a sibling method whose name agrees up to this point. A byte that
/// matches neither is `invalid_method`; a NUL byte anywhere is also
/// `invalid_method` (spec.md §4.3).
pub(crate) struct MethodMatcher {
    candidate: Method,
    index: usize,
}

impl MethodMatcher {
    /// Start matching from the first byte of the method name.
    pub(crate) fn start(first: u8) -> Result<Self> {
        let candidate = first_byte_candidate(first)?;
        Ok(MethodMatcher {
            candidate,
            index: 1,
        })
    }

    /// Feed the next byte. Returns `Ok(Some(method))` once a full method
    /// name plus its terminating space has been consumed by the caller
    /// (the caller detects the terminating space itself and calls
    /// [`MethodMatcher::finish`]).
    pub(crate) fn advance(&mut self, b: u8) -> Result<()> {
        if b == 0 {
            return Err(ErrorKind::InvalidMethod);
        }

        let name = self.candidate.name().as_bytes();
        if self.index < name.len() && name[self.index] == b {
            self.index += 1;
            return Ok(());
        }

        // Disambiguate: is there a sibling method whose name agrees with
        // everything matched so far, plus this byte?
        if let Some(switched) = disambiguate(self.candidate, self.index, b) {
            self.candidate = switched;
            self.index += 1;
            return Ok(());
        }

        Err(ErrorKind::InvalidMethod)
    }

    /// Called when the request line reaches the space that ends the
    /// method token. Fails unless the full candidate name was matched.
    pub(crate) fn finish(&self) -> Result<Method> {
        if self.index == self.candidate.name().len() {
            Ok(self.candidate)
        } else {
            Err(ErrorKind::InvalidMethod)
        }
    }
}

fn first_byte_candidate(b: u8) -> Result<Method> {
    use Method::*;
    Ok(match b {
        b'A' => Acl,
        b'B' => Bind,
        b'C' => Connect, // also COPY, CHECKOUT
        b'D' => Delete,
        b'G' => Get,
        b'H' => Head,
        b'L' => Lock, // also LINK
        b'M' => MkCol, // also MOVE, MERGE, MKACTIVITY, MKCALENDAR, M-SEARCH
        b'N' => Notify,
        b'O' => Options,
        b'P' => Post, // also PUT, PATCH, PROPFIND, PROPPATCH, PURGE
        b'R' => Rebind, // also REPORT
        b'S' => Search, // also SUBSCRIBE, SOURCE
        b'T' => Trace,
        b'U' => Unlock, // also UNBIND, UNSUBSCRIBE, UNLINK
        _ => return Err(ErrorKind::InvalidMethod),
    })
}

/// `(current candidate, index, byte) -> new candidate` discriminator
/// table, consulted only once a byte fails to continue the current
/// candidate's own name. Each arm is a branch point named in spec.md
/// §4.3: the index is where two method names first disagree, so once a
/// switch happens the new candidate's own name matches everything after.
fn disambiguate(current: Method, index: usize, b: u8) -> Option<Method> {
    use Method::*;
    Some(match (current, index, b) {
        // C: CONNECT (default) / COPY / CHECKOUT
        (Connect, 1, b'H') => Checkout,
        (Connect, 2, b'P') => Copy,

        // L: LOCK (default) / LINK
        (Lock, 1, b'I') => Link,

        // M: MKCOL (default) / MOVE / MERGE / MKACTIVITY / MKCALENDAR / M-SEARCH
        (MkCol, 1, b'O') => Move,
        (MkCol, 1, b'E') => Merge,
        (MkCol, 1, b'-') => MSearch,
        (MkCol, 2, b'A') => MkActivity,
        (MkCol, 3, b'A') => MkCalendar,

        // P: POST (default) / PUT / PATCH / PROPFIND / PROPPATCH / PURGE
        (Post, 1, b'U') => Put,
        (Post, 1, b'A') => Patch,
        (Post, 1, b'R') => PropFind,
        (Put, 2, b'R') => Purge,
        (PropFind, 4, b'P') => PropPatch,

        // R: REBIND (default) / REPORT
        (Rebind, 2, b'P') => Report,

        // S: SEARCH (default) / SUBSCRIBE / SOURCE
        (Search, 1, b'U') => Subscribe,
        (Search, 1, b'O') => Source,

        // U: UNLOCK (default) / UNBIND / UNSUBSCRIBE / UNLINK
        (Unlock, 2, b'B') => Unbind,
        (Unlock, 2, b'S') => Unsubscribe,
        (Unlock, 3, b'I') => Unlink,

        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn match_all(bytes: &[u8]) -> Result<Method> {
        let mut m = MethodMatcher::start(bytes[0])?;
        for &b in &bytes[1..] {
            m.advance(b)?;
        }
        m.finish()
    }

    #[test]
    fn matches_simple_methods() {
        assert_eq!(match_all(b"GET").unwrap(), Method::Get);
        assert_eq!(match_all(b"HEAD").unwrap(), Method::Head);
        assert_eq!(match_all(b"DELETE").unwrap(), Method::Delete);
        assert_eq!(match_all(b"OPTIONS").unwrap(), Method::Options);
        assert_eq!(match_all(b"TRACE").unwrap(), Method::Trace);
        assert_eq!(match_all(b"CONNECT").unwrap(), Method::Connect);
        assert_eq!(match_all(b"NOTIFY").unwrap(), Method::Notify);
        assert_eq!(match_all(b"ACL").unwrap(), Method::Acl);
    }

    #[test]
    fn disambiguates_p_prefixed_methods() {
        assert_eq!(match_all(b"POST").unwrap(), Method::Post);
        assert_eq!(match_all(b"PUT").unwrap(), Method::Put);
        assert_eq!(match_all(b"PATCH").unwrap(), Method::Patch);
        assert_eq!(match_all(b"PURGE").unwrap(), Method::Purge);
        assert_eq!(match_all(b"PROPFIND").unwrap(), Method::PropFind);
        assert_eq!(match_all(b"PROPPATCH").unwrap(), Method::PropPatch);
    }

    #[test]
    fn disambiguates_m_prefixed_methods() {
        assert_eq!(match_all(b"MKCOL").unwrap(), Method::MkCol);
        assert_eq!(match_all(b"MOVE").unwrap(), Method::Move);
        assert_eq!(match_all(b"MERGE").unwrap(), Method::Merge);
        assert_eq!(match_all(b"MKACTIVITY").unwrap(), Method::MkActivity);
        assert_eq!(match_all(b"MKCALENDAR").unwrap(), Method::MkCalendar);
        assert_eq!(match_all(b"M-SEARCH").unwrap(), Method::MSearch);
    }

    #[test]
    fn rejects_garbage() {
        assert!(match_all(b"GETX").is_err());
        assert!(match_all(b"ZZZZZ").is_err());
        assert!(MethodMatcher::start(0).is_err());
    }

    #[test]
    fn rejects_nul_byte_in_method() {
        let mut m = MethodMatcher::start(b'G').unwrap();
        assert!(m.advance(0).is_err());
    }

    #[test]
    fn method_name_round_trips() {
        assert_eq!(method_name(Method::MSearch), "M-SEARCH");
        assert_eq!(method_name(Method::Get), "GET");
    }
}
