//! BOM sniffing and UTF-16 transcoding, per spec §4.1/§6: input is UTF-8
//! or BOM-prefixed UTF-16 and must be decoded before the SRT grammar runs.

use crate::error::{ParseError, Result};

pub fn decode(bytes: &[u8]) -> Result<String> {
    if let Some(stripped) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(stripped, encoding_rs::UTF_16LE);
    }
    if let Some(stripped) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(stripped, encoding_rs::UTF_16BE);
    }
    let without_bom = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    std::str::from_utf8(without_bom)
        .map(|s| s.to_string())
        .map_err(|e| ParseError::UndecodableEncoding(e.to_string()).into())
}

fn decode_utf16(bytes: &[u8], encoding: &'static encoding_rs::Encoding) -> Result<String> {
    let (cow, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ParseError::UndecodableEncoding(format!(
            "invalid {} sequence",
            encoding.name()
        ))
        .into());
    }
    Ok(cow.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_utf8() {
        assert_eq!(decode("hello".as_bytes()).unwrap(), "hello");
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("hi".as_bytes());
        assert_eq!(decode(&bytes).unwrap(), "hi");
    }

    #[test]
    fn decodes_utf16le_with_bom() {
        let (encoded, _, _) = encoding_rs::UTF_16LE.encode("hola");
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend_from_slice(&encoded);
        assert_eq!(decode(&bytes).unwrap(), "hola");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let bytes = vec![0xFF, 0xFF, 0x00];
        assert!(decode(&bytes).is_err());
    }
}
