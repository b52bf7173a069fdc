//! Fuzz target: operator console parser
//!
//! Arbitrary UTF-8 lines go through `console::parse`, which also covers
//! the `"1,3,5-10"` id-selection grammar.  Parsing must never panic, and
//! a parsed selection must never contain id 0.
//!
//! cargo fuzz run fuzz_console_line

#![no_main]

use libfuzzer_sys::fuzz_target;
use soilguard::app::console::{ConsoleRequest, parse};
use soilguard::records::IdSelection;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(ConsoleRequest::Delete { ids, .. }) = parse(line) {
        if let IdSelection::Ranges(ranges) = &ids {
            assert!(ranges.iter().all(|r| r.first >= 1 && r.first <= r.last));
        }
    }

    let _ = IdSelection::parse(line);
});
