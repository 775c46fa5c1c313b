use std::io::{Read, Write};

use adler::adler32_slice;
use aes::cipher::generic_array::GenericArray;
use aes::{
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit},
    Aes256,
};
use anyhow::{bail, Context, Result};
use flate2::{
    read::{DeflateDecoder, ZlibDecoder},
    write::ZlibEncoder,
    Compression,
};

const BLOCK_SIZE: usize = 16;
const BASE_KEY: [u8; 32] = [
    0x35, 0xEC, 0x33, 0x77, 0xF3, 0x5D, 0xB0, 0xEA, 0xBE, 0x6B, 0x83, 0x11, 0x54, 0x03, 0xEB, 0xFB,
    0x27, 0x25, 0x64, 0x2E, 0xD5, 0x49, 0x06, 0x29, 0x05, 0x78, 0xBD, 0x60, 0xBA, 0x4A, 0xA7, 0x87,
];

// The low 8 bytes of the base key are XORed with the platform id.
pub fn derive_key(user_id: &str) -> Result<[u8; 32]> {
    let digits: String = user_id.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        bail!("user id must contain digits");
    }
    let id: u64 = digits
        .parse()
        .with_context(|| format!("user id {digits} does not fit in 64 bits"))?;

    let mut key = BASE_KEY;
    key.iter_mut()
        .zip(id.to_le_bytes())
        .for_each(|(byte, id_byte)| *byte ^= id_byte);
    Ok(key)
}

pub fn decrypt_sav_to_yaml(encrypted: &[u8], user_id: &str) -> Result<Vec<u8>> {
    SaveCipher::for_user(user_id)?.open(encrypted)
}

pub fn encrypt_yaml_to_sav(yaml_bytes: &[u8], user_id: &str) -> Result<Vec<u8>> {
    SaveCipher::for_user(user_id)?.seal(yaml_bytes)
}

// AES-256-ECB over `zlib(yaml) ++ footer`, PKCS#7 padded.
struct SaveCipher {
    cipher: Aes256,
}

impl SaveCipher {
    fn for_user(user_id: &str) -> Result<Self> {
        let key = derive_key(user_id)?;
        Ok(Self::with_key(&key))
    }

    fn with_key(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256::new(GenericArray::from_slice(key)),
        }
    }

    fn open(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
        if encrypted.len() % BLOCK_SIZE != 0 {
            bail!(
                "save is {} bytes, not a whole number of {BLOCK_SIZE}-byte blocks",
                encrypted.len()
            );
        }
        let mut buffer = encrypted.to_vec();
        self.decrypt_blocks(&mut buffer);

        // Some writers skip the padding; fall back to the raw plaintext.
        let body = strip_padding(&buffer).unwrap_or(&buffer[..]);
        let yaml_bytes = inflate(body)?;
        if let Some(footer) = Footer::read(body) {
            footer.check(&yaml_bytes)?;
        }
        Ok(yaml_bytes)
    }

    fn seal(&self, yaml_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(yaml_bytes)?;
        let mut body = encoder.finish().context("failed to finish zlib stream")?;
        Footer::for_payload(yaml_bytes).write(&mut body);

        let mut sealed = add_padding(body);
        self.encrypt_blocks(&mut sealed);
        Ok(sealed)
    }

    fn encrypt_blocks(&self, data: &mut [u8]) {
        data.chunks_exact_mut(BLOCK_SIZE)
            .for_each(|block| self.cipher.encrypt_block(GenericArray::from_mut_slice(block)));
    }

    fn decrypt_blocks(&self, data: &mut [u8]) {
        data.chunks_exact_mut(BLOCK_SIZE)
            .for_each(|block| self.cipher.decrypt_block(GenericArray::from_mut_slice(block)));
    }
}

// Trailer after the zlib stream: adler32 (big-endian) and length (little-endian)
// of the uncompressed YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Footer {
    checksum: u32,
    length: u32,
}

impl Footer {
    const LEN: usize = 8;

    fn for_payload(payload: &[u8]) -> Self {
        Self {
            checksum: adler32_slice(payload),
            length: payload.len() as u32,
        }
    }

    fn read(body: &[u8]) -> Option<Self> {
        let tail = body.len().checked_sub(Self::LEN).map(|start| &body[start..])?;
        let (checksum, length) = tail.split_at(4);
        Some(Self {
            checksum: u32::from_be_bytes(checksum.try_into().ok()?),
            length: u32::from_le_bytes(length.try_into().ok()?),
        })
    }

    fn write(&self, body: &mut Vec<u8>) {
        body.extend_from_slice(&self.checksum.to_be_bytes());
        body.extend_from_slice(&self.length.to_le_bytes());
    }

    fn check(&self, payload: &[u8]) -> Result<()> {
        let actual = Self::for_payload(payload);
        if actual.checksum != self.checksum {
            bail!(
                "checksum mismatch: expected {:#010x}, got {:#010x}",
                self.checksum,
                actual.checksum
            );
        }
        if actual.length != self.length {
            bail!(
                "length mismatch: expected {}, got {}",
                self.length,
                actual.length
            );
        }
        Ok(())
    }
}

// Saves are zlib streams, but some tools write raw deflate.
fn inflate(body: &[u8]) -> Result<Vec<u8>> {
    let mut yaml_bytes = Vec::new();
    let zlib_err = match ZlibDecoder::new(body).read_to_end(&mut yaml_bytes) {
        Ok(_) => return Ok(yaml_bytes),
        Err(err) => err,
    };

    yaml_bytes.clear();
    DeflateDecoder::new(body)
        .read_to_end(&mut yaml_bytes)
        .map_err(|deflate_err| {
            let preview: Vec<String> = body.iter().take(16).map(|b| format!("{b:02x}")).collect();
            anyhow::anyhow!(
                "corrupt deflate stream (zlib error: {zlib_err}; deflate error: {deflate_err}; first bytes: {})",
                preview.join(" ")
            )
        })?;
    Ok(yaml_bytes)
}

fn add_padding(mut data: Vec<u8>) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    data.resize(data.len() + pad_len, pad_len as u8);
    data
}

fn strip_padding(data: &[u8]) -> Result<&[u8]> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        bail!("padded data must be a non-empty multiple of {BLOCK_SIZE} bytes");
    }
    let pad_len = data[data.len() - 1] as usize;
    if !(1..=BLOCK_SIZE).contains(&pad_len) {
        bail!("invalid padding length {pad_len}");
    }
    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&byte| byte as usize != pad_len) {
        bail!("invalid padding bytes");
    }
    Ok(body)
}
