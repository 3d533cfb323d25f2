use byteorder::{ByteOrder, LittleEndian};

/// 默认的引用值解码宽度上限（字节）
pub const DEFAULT_MAX_REFERENCE_WIDTH: usize = 6;

/// `u64` 能容纳的最大解码宽度
pub const MAX_SUPPORTED_WIDTH: usize = 8;

/// 以小端无符号整数解码字节
///
/// 实际宽度为 `min(data.len(), max_width)`，只读取前若干字节。
/// 宽度为 0 时没有可解码的值，返回 None。
pub fn read_le_uint(data: &[u8], max_width: usize) -> Option<u64> {
    let width = data.len().min(max_width).min(MAX_SUPPORTED_WIDTH);
    if width == 0 {
        return None;
    }
    Some(LittleEndian::read_uint(&data[..width], width))
}

/// 可打印 ASCII 字符，其余显示为 `.`
pub fn printable_ascii(byte: u8) -> char {
    if (0x20..=0x7E).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}
