use std::io::{Read, Write};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

// zlib + base64, the format the web unlocker embeds its data tables in.
pub fn compress_to_blob(data: &[u8]) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish().context("failed to finish zlib stream")?;
    Ok(STANDARD.encode(compressed))
}

pub fn decompress_blob(blob: &str) -> Result<Vec<u8>> {
    let compact: String = blob.chars().filter(|ch| !ch.is_ascii_whitespace()).collect();
    let compressed = STANDARD
        .decode(compact.as_bytes())
        .context("blob is not valid base64")?;
    let mut data = Vec::new();
    ZlibDecoder::new(&compressed[..])
        .read_to_end(&mut data)
        .context("blob is not a valid zlib stream")?;
    Ok(data)
}

pub fn looks_like_blob(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(|ch| {
            ch.is_ascii_alphanumeric() || ch.is_ascii_whitespace() || matches!(ch, '+' | '/' | '=')
        })
}
