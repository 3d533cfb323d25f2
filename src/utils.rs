use thiserror::Error;
use std::path::Path;

/// 非法的十六进制字节文本（必须恰好是两位十六进制数字）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid byte text: {0:?} (expected exactly two hex digits)")]
pub struct InvalidByteText(pub String);

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum HexMetaError {
    #[error(transparent)]
    InvalidByteText(#[from] InvalidByteText),

    #[error("Duplicate field id: {0}")]
    DuplicateFieldId(String),

    #[error("Array field {array} has entry {entry} without a fixed length")]
    VariableLengthEntry { array: String, entry: String },

    #[error("Offset {offset} is outside the buffer (length {len})")]
    OffsetOutOfRange { offset: u64, len: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// 解析两位十六进制字节文本（大小写均可）
pub fn parse_hex_byte(text: &str) -> Result<u8, InvalidByteText> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_hexdigit) {
        return Err(InvalidByteText(text.to_string()));
    }

    u8::from_str_radix(text, 16).map_err(|_| InvalidByteText(text.to_string()))
}

/// 解析偏移量参数，支持十进制和 `0x` 前缀的十六进制
pub fn parse_offset(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<std::path::PathBuf, HexMetaError> {
    if !file_path.exists() {
        return Err(HexMetaError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "原文件不存在"
        )));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let backup_path = match file_path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => file_path.with_extension(format!("{}.{}.bak", ext, timestamp)),
        None => file_path.with_extension(format!("{}.bak", timestamp)),
    };

    std::fs::copy(file_path, &backup_path)?;

    Ok(backup_path)
}
