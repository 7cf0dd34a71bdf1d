// Firmware image codec - position-keyed XOR obfuscation used for images on disk
use anyhow::{Context, Result};
use std::path::Path;

const MAGIC: usize = 0x63B38;

/// Self-inverse: applying it twice yields the input.
pub fn transform(bytes: &[u8]) -> Vec<u8> {
    let len = bytes.len();
    let key_base = len + MAGIC - len / MAGIC;
    bytes
        .iter()
        .enumerate()
        .map(|(i, byte)| byte ^ ((i + key_base) & 0xFF) as u8)
        .collect()
}

pub fn read_file(path: &Path, decode: bool) -> Result<Vec<u8>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read firmware image {}", path.display()))?;
    Ok(if decode { transform(&raw) } else { raw })
}

pub fn write_file(path: &Path, data: &[u8], encode: bool) -> Result<()> {
    let bytes = if encode { transform(data) } else { data.to_vec() };
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write firmware image {}", path.display()))
}
