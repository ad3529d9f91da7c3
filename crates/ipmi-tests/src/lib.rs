//! Shared helpers for wire-codec tests.

#![forbid(unsafe_code)]

/// Decodes a hex fixture string into bytes. Whitespace is ignored, so
/// fixtures may be grouped per field for readability.
pub fn hex_bytes(fixture: &str) -> Vec<u8> {
    let cleaned: String = fixture.chars().filter(|c| !c.is_whitespace()).collect();
    assert!(
        cleaned.len() % 2 == 0,
        "odd number of hex digits in fixture"
    );
    (0..cleaned.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&cleaned[i..i + 2], 16).expect("bad hex digit in fixture"))
        .collect()
}

/// Generates a test that decodes a hex fixture into the given value and
/// re-encodes the value back into the fixture.
#[macro_export]
macro_rules! test_codec {
    ($ty:ty => $name:ident: $value:expr => $hex:expr) => {
        #[test]
        fn $name() {
            use binrw::{BinRead, BinWrite};

            let expected: $ty = $value;
            let bytes = $crate::hex_bytes($hex);
            let parsed =
                <$ty>::read(&mut std::io::Cursor::new(&bytes)).expect("fixture failed to decode");
            assert_eq!(parsed, expected);

            let mut out = std::io::Cursor::new(Vec::new());
            expected.write(&mut out).expect("value failed to encode");
            assert_eq!(out.into_inner(), bytes);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_bytes_ignores_whitespace() {
        assert_eq!(hex_bytes("06 00\nff07"), vec![0x06, 0x00, 0xff, 0x07]);
    }
}
