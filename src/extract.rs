//! Text extraction from raw file bytes.
//!
//! The loader only ingests files whose bytes are recognisably in the UTF
//! family. Detection looks at the byte-order mark first; BOM-less content is
//! accepted only when it is valid UTF-8 and free of NUL bytes. Anything else
//! (binary assets, legacy 8-bit encodings, empty files) is rejected rather
//! than guessed.

/// Encodings the loader accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl Encoding {
    fn bom_len(self) -> usize {
        match self {
            Encoding::Utf8 => 0,
            Encoding::Utf8Bom => 3,
            Encoding::Utf16Le | Encoding::Utf16Be => 2,
            Encoding::Utf32Le | Encoding::Utf32Be => 4,
        }
    }
}

/// Extraction error. The loader skips the file; nothing here panics.
#[derive(Debug)]
pub enum ExtractError {
    /// Encoding could not be identified as UTF.
    Unrecognized,
    /// Encoding was identified but the bytes do not decode.
    Decode(Encoding, String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unrecognized => write!(f, "encoding not recognised as UTF"),
            ExtractError::Decode(enc, e) => write!(f, "{:?} decode failed: {}", enc, e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Identify the encoding of `bytes`, or `None` if it is not a UTF encoding.
pub fn detect_encoding(bytes: &[u8]) -> Option<Encoding> {
    if bytes.is_empty() {
        return None;
    }

    // UTF-32 LE shares its first two bytes with UTF-16 LE, so check it first.
    if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return Some(Encoding::Utf32Le);
    }
    if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        return Some(Encoding::Utf32Be);
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some(Encoding::Utf8Bom);
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Some(Encoding::Utf16Le);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Some(Encoding::Utf16Be);
    }

    if bytes.contains(&0) {
        return None;
    }
    std::str::from_utf8(bytes).ok().map(|_| Encoding::Utf8)
}

/// Decode `bytes` to a `String`, rejecting non-UTF content.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let encoding = detect_encoding(bytes).ok_or(ExtractError::Unrecognized)?;
    let body = &bytes[encoding.bom_len()..];

    match encoding {
        Encoding::Utf8 | Encoding::Utf8Bom => String::from_utf8(body.to_vec())
            .map_err(|e| ExtractError::Decode(encoding, e.to_string())),
        Encoding::Utf16Le | Encoding::Utf16Be => decode_utf16(encoding, body),
        Encoding::Utf32Le | Encoding::Utf32Be => decode_utf32(encoding, body),
    }
}

fn decode_utf16(encoding: Encoding, body: &[u8]) -> Result<String, ExtractError> {
    if body.len() % 2 != 0 {
        return Err(ExtractError::Decode(
            encoding,
            "odd number of bytes".to_string(),
        ));
    }
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| match encoding {
            Encoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
            _ => u16::from_le_bytes([pair[0], pair[1]]),
        })
        .collect();
    String::from_utf16(&units).map_err(|e| ExtractError::Decode(encoding, e.to_string()))
}

fn decode_utf32(encoding: Encoding, body: &[u8]) -> Result<String, ExtractError> {
    if body.len() % 4 != 0 {
        return Err(ExtractError::Decode(
            encoding,
            "length is not a multiple of 4".to_string(),
        ));
    }
    body.chunks_exact(4)
        .map(|quad| {
            let bytes = [quad[0], quad[1], quad[2], quad[3]];
            let code = match encoding {
                Encoding::Utf32Be => u32::from_be_bytes(bytes),
                _ => u32::from_le_bytes(bytes),
            };
            char::from_u32(code).ok_or_else(|| {
                ExtractError::Decode(encoding, format!("invalid code point {:#x}", code))
            })
        })
        .collect()
}
