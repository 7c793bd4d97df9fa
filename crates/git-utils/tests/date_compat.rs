//! Date compatibility tests comparing our parsing with C git's raw date format.

use bstr::BStr;
use git_utils::date::{GitDate, Signature};

/// Verify raw format round-trips correctly.
#[test]
fn raw_format_roundtrip() {
    let inputs = [
        "1234567890 +0000",
        "1234567890 -0500",
        "1234567890 +0530",
        "0 +0000",
        "1700000000 +1200",
        "1700000000 -1100",
    ];

    for input in inputs {
        let date = GitDate::parse_raw(input).unwrap();
        let sig = Signature {
            name: "N".into(),
            email: "e@e".into(),
            date,
        };
        let formatted = sig.to_bytes();
        let reparsed = Signature::parse(bstr::BStr::new(&formatted)).unwrap();

        assert_eq!(
            date.timestamp, reparsed.date.timestamp,
            "timestamp mismatch for input: {}",
            input
        );
        assert_eq!(
            date.tz_offset, reparsed.date.tz_offset,
            "tz_offset mismatch for input: {}",
            input
        );
    }
}

/// Verify signature round-trips through parse -> to_bytes -> parse.
#[test]
fn signature_roundtrip() {
    let inputs = [
        "John Doe <john@example.com> 1234567890 +0000",
        "Jane Smith <jane@test.org> 1700000000 -0500",
        "A B C <abc@d.e> 0 +0000",
    ];

    for input in inputs {
        let sig = Signature::parse(BStr::new(input.as_bytes())).unwrap();
        let bytes = sig.to_bytes();
        let reparsed = Signature::parse(BStr::new(&bytes)).unwrap();

        assert_eq!(sig.name, reparsed.name, "name mismatch for: {}", input);
        assert_eq!(sig.email, reparsed.email, "email mismatch for: {}", input);
        assert_eq!(
            sig.date.timestamp, reparsed.date.timestamp,
            "timestamp mismatch for: {}",
            input
        );
        assert_eq!(
            sig.date.tz_offset, reparsed.date.tz_offset,
            "tz_offset mismatch for: {}",
            input
        );
    }
}

/// Verify various timezone offsets parse to the expected minute values.
#[test]
fn timezone_offsets() {
    let cases = [
        ("+0000", 0),
        ("-0500", -300),
        ("+0530", 330),
        ("+1200", 720),
        ("-1100", -660),
        ("+0100", 60),
        ("-0800", -480),
    ];

    for (tz_str, expected_minutes) in cases {
        let input = format!("1234567890 {}", tz_str);
        let date = GitDate::parse_raw(&input).unwrap();
        assert_eq!(
            date.tz_offset, expected_minutes,
            "tz_offset mismatch for {}",
            tz_str
        );
    }
}

/// Verify parse_raw handles edge case timestamps.
#[test]
fn edge_timestamps() {
    // Epoch
    let date = GitDate::parse_raw("0 +0000").unwrap();
    assert_eq!(date.timestamp, 0);

    // Very large timestamp (year ~2106)
    let date = GitDate::parse_raw("4294967295 +0000").unwrap();
    assert_eq!(date.timestamp, 4294967295);
}
