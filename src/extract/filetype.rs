//! RISC OS filetypes of ZIP members
//!
//! RISC OS zip tools store each file's load and exec addresses in an `ARC0`
//! extra field. A typed file has a load address of the form `0xFFFtttdd`, where
//! `ttt` is the 12-bit filetype. The three digits are read nibble by nibble: the
//! low nibble of the third address byte, then both nibbles of the second.
//! Archives made by Info-ZIP on other systems carry the type as a `,xxx` suffix
//! on the member name instead.

/// Extra field header id of the RISC OS `ARC0` block ("AC" little-endian)
pub const ARC0_HEADER_ID: u16 = 0x4341;

const ARC0_SIGNATURE: &[u8; 4] = b"ARC0";

/// Binary nibble to hex digit
pub const NIBBLE_TABLE: [(u8, char); 16] = [
    (0x0, '0'),
    (0x1, '1'),
    (0x2, '2'),
    (0x3, '3'),
    (0x4, '4'),
    (0x5, '5'),
    (0x6, '6'),
    (0x7, '7'),
    (0x8, '8'),
    (0x9, '9'),
    (0xA, 'A'),
    (0xB, 'B'),
    (0xC, 'C'),
    (0xD, 'D'),
    (0xE, 'E'),
    (0xF, 'F'),
];

/// Maps a 4-bit value to its upper-case hex digit
pub fn nibble_to_hex(nibble: u8) -> Option<char> {
    NIBBLE_TABLE
        .iter()
        .find(|(value, _)| *value == nibble)
        .map(|(_, digit)| *digit)
}

/// Maps a hex digit (either case) back to its 4-bit value
pub fn hex_to_nibble(digit: char) -> Option<u8> {
    let digit = digit.to_ascii_uppercase();
    NIBBLE_TABLE
        .iter()
        .find(|(_, d)| *d == digit)
        .map(|(value, _)| *value)
}

/// Decodes the filetype held in a RISC OS load address
///
/// Returns `None` for untyped (load/exec) files.
pub fn filetype_from_load_address(load: u32) -> Option<String> {
    if load >> 20 != 0xFFF {
        return None;
    }
    let bytes = load.to_le_bytes();
    [bytes[2] & 0x0F, bytes[1] >> 4, bytes[1] & 0x0F]
        .into_iter()
        .map(nibble_to_hex)
        .collect()
}

/// Builds the load address for filetype `filetype` (three hex digits)
pub fn load_address_for(filetype: &str) -> Option<u32> {
    if filetype.chars().count() != 3 {
        return None;
    }
    let mut value: u32 = 0;
    for digit in filetype.chars() {
        value = (value << 4) | u32::from(hex_to_nibble(digit)?);
    }
    Some(0xFFF0_0000 | (value << 8))
}

/// Scans a ZIP extra field for an `ARC0` block and decodes its filetype
pub fn decode_arc0(extra: &[u8]) -> Option<String> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let id = u16::from_le_bytes([rest[0], rest[1]]);
        let size = usize::from(u16::from_le_bytes([rest[2], rest[3]]));
        let data = rest.get(4..4 + size)?;

        if id == ARC0_HEADER_ID && data.len() >= 8 && &data[..4] == ARC0_SIGNATURE {
            let load = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
            return filetype_from_load_address(load);
        }
        rest = &rest[4 + size..];
    }
    None
}

/// Encodes an `ARC0` extra field block for filetype `filetype`
pub fn arc0_extra_field(filetype: &str) -> Option<Vec<u8>> {
    let load = load_address_for(filetype)?;
    let mut block = Vec::with_capacity(24);
    block.extend_from_slice(&ARC0_HEADER_ID.to_le_bytes());
    block.extend_from_slice(&20u16.to_le_bytes());
    block.extend_from_slice(ARC0_SIGNATURE);
    block.extend_from_slice(&load.to_le_bytes());
    // exec address
    block.extend_from_slice(&0u32.to_le_bytes());
    // attributes: owner read/write
    block.extend_from_slice(&3u32.to_le_bytes());
    // reserved
    block.extend_from_slice(&0u32.to_le_bytes());
    Some(block)
}

/// Reads an Info-ZIP `,xxx` filetype suffix from a member name
pub fn filetype_from_name(name: &str) -> Option<String> {
    let (_, suffix) = name.rsplit_once(',')?;
    if suffix.len() == 3 && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(suffix.to_ascii_uppercase())
    } else {
        None
    }
}

/// Strips an Info-ZIP `,xxx` suffix, if present
pub fn strip_filetype_suffix(name: &str) -> &str {
    match filetype_from_name(name) {
        Some(_) => &name[..name.len() - 4],
        None => name,
    }
}

/// Filetype of a member from its extra field, falling back to its name
pub fn filetype_of(name: &str, extra: &[u8]) -> Option<String> {
    decode_arc0(extra).or_else(|| filetype_from_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_table_roundtrip() {
        for (value, digit) in NIBBLE_TABLE {
            assert_eq!(nibble_to_hex(value), Some(digit));
            assert_eq!(hex_to_nibble(digit), Some(value));
            assert_eq!(hex_to_nibble(digit.to_ascii_lowercase()), Some(value));
        }
        assert_eq!(nibble_to_hex(0x10), None);
        assert_eq!(hex_to_nibble('G'), None);
    }

    #[test]
    fn test_load_address_decoding() {
        assert_eq!(filetype_from_load_address(0xFFFFFA00).as_deref(), Some("FFA"));
        assert_eq!(filetype_from_load_address(0xFFF10200).as_deref(), Some("102"));
        assert_eq!(filetype_from_load_address(0xFFFAE533).as_deref(), Some("AE5"));
        // Untyped file with a real load address
        assert_eq!(filetype_from_load_address(0x00008000), None);
    }

    #[test]
    fn test_every_filetype_survives_the_extra_field() {
        for value in 0..0x1000u32 {
            let filetype = format!("{:03X}", value);
            let extra = arc0_extra_field(&filetype).unwrap();
            assert_eq!(decode_arc0(&extra), Some(filetype));
        }
    }

    #[test]
    fn test_arc0_found_after_other_blocks() {
        // An extended timestamp block (0x5455) ahead of ARC0
        let mut extra = vec![0x55, 0x54, 0x05, 0x00, 0x01, 0, 0, 0, 0];
        extra.extend(arc0_extra_field("FEC").unwrap());
        assert_eq!(decode_arc0(&extra).as_deref(), Some("FEC"));
    }

    #[test]
    fn test_truncated_extra_field() {
        let extra = arc0_extra_field("FFF").unwrap();
        assert_eq!(decode_arc0(&extra[..10]), None);
        assert_eq!(decode_arc0(&[]), None);
    }

    #[test]
    fn test_name_suffix_fallback() {
        assert_eq!(filetype_from_name("!Zap/Modules/ZapMod,ffa").as_deref(), Some("FFA"));
        assert_eq!(filetype_from_name("!Zap/!Help"), None);
        assert_eq!(filetype_from_name("a,b/c,zz"), None);
        assert_eq!(strip_filetype_suffix("!Zap/!RunImage,ff8"), "!Zap/!RunImage");
        assert_eq!(strip_filetype_suffix("!Zap/!Help"), "!Zap/!Help");
        assert_eq!(filetype_of("x,ff6", &[]).as_deref(), Some("FF6"));
    }

    #[test]
    fn test_load_address_for_rejects_bad_input() {
        assert_eq!(load_address_for("FFAA"), None);
        assert_eq!(load_address_for("XYZ"), None);
        assert_eq!(load_address_for("ffa"), Some(0xFFFFFA00));
    }
}
