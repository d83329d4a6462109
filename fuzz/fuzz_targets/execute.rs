#![no_main]

use libfuzzer_sys::fuzz_target;

use flowparse::{MessageType, Parser, Settings};

fuzz_target!(|data: &[u8]| {
    // Mirrors the original project's own parser fuzzer: settings with
    // every callback absent, `MessageType::Either`, one `execute` call
    // over the whole input.
    let settings: Settings<()> = Settings::default();
    let mut parser = Parser::new(MessageType::Either, ());
    parser.execute(&settings, data);

    // Also drive the same bytes through an arbitrary split, to shake out
    // anything that only misbehaves across an `execute` boundary.
    if data.len() > 1 {
        let split = data.len() / 2;
        let mut split_parser = Parser::new(MessageType::Either, ());
        split_parser.execute(&settings, &data[..split]);
        split_parser.execute(&settings, &data[split..]);
    }
});
