#![no_main]
use libfuzzer_sys::fuzz_target;
use xmldom::{node_to_string, parse, XmlParser};

fuzz_target!(|data: &[u8]| {
    // Undecodable bytes must come back as an error, never a panic.
    let _ = XmlParser::new().parse_bytes(data);

    if let Ok(s) = std::str::from_utf8(data) {
        // Parse -> serialize -> parse must succeed once the first parse has.
        if let Ok(doc) = parse(s) {
            let output = node_to_string(&doc);
            let again = parse(&output).map(|d| node_to_string(&d));
            assert_eq!(again.as_deref(), Ok(output.as_str()));
        }
    }
});
