#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let is_connect = data.first().map(|b| b & 1 == 1).unwrap_or(false);
    let rest = if data.is_empty() { data } else { &data[1..] };
    let Ok(c) = flowparse::parse_url(rest, is_connect) else {
        return;
    };
    let _ = c.schema(rest);
    let _ = c.userinfo(rest);
    let _ = c.host(rest);
    let _ = c.port();
    let _ = c.path(rest);
    let _ = c.query(rest);
    let _ = c.fragment(rest);
});
