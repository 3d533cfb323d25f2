/// 十六进制转储
///
/// 把任意字节区间渲染为 `偏移 || 十六进制 || ASCII` 形式的文本行，
/// 并提供按页递增加载的游标。
use crate::config::ViewerConfig;
use crate::datatypes::printable_ascii;
use crate::editor::{ByteEdit, EditOverlay};
use crate::range::SourceRange;

/// 一行转储
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRow {
    pub offset: u64,
    /// 每个字节一列，两位大写十六进制；已删除的字节为 `--`
    pub cells: Vec<String>,
    pub ascii: String,
}

impl HexRow {
    /// 按固定列宽格式化（不足一行时补空格）
    pub fn render(&self, bytes_per_line: usize) -> String {
        let mut hex = self.cells.join(" ");
        let width = bytes_per_line.saturating_mul(3).saturating_sub(1);
        while hex.len() < width {
            hex.push(' ');
        }
        format!("0x{:08X} || {} || {}", self.offset, hex, self.ascii)
    }
}

/// 转储渲染器
#[derive(Debug, Clone, Copy)]
pub struct HexDumper {
    bytes_per_line: usize,
}

impl HexDumper {
    pub fn new(bytes_per_line: usize) -> Self {
        Self {
            bytes_per_line: bytes_per_line.max(1),
        }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(config.bytes_per_line)
    }

    pub fn bytes_per_line(&self) -> usize {
        self.bytes_per_line
    }

    /// 渲染 `range` 内的字节，超出缓冲区的部分被截掉
    ///
    /// 传入覆盖层时显示编辑后的值。
    pub fn rows(&self, buffer: &[u8], range: SourceRange, overlay: Option<&EditOverlay>) -> Vec<HexRow> {
        let range = range.clamp_to(buffer.len() as u64);
        let Some(slice) = range.to_slice_range(buffer.len()) else {
            return Vec::new();
        };

        buffer[slice]
            .chunks(self.bytes_per_line)
            .enumerate()
            .map(|(line, chunk)| {
                let offset = range.start() + (line * self.bytes_per_line) as u64;
                let mut cells = Vec::with_capacity(chunk.len());
                let mut ascii = String::with_capacity(chunk.len());

                for (idx, &original) in chunk.iter().enumerate() {
                    match overlay.and_then(|o| o.get(offset + idx as u64)) {
                        Some(ByteEdit::Delete) => {
                            cells.push("--".to_string());
                            ascii.push(' ');
                        }
                        Some(ByteEdit::Overwrite(value)) => {
                            cells.push(format!("{:02X}", value));
                            ascii.push(printable_ascii(value));
                        }
                        None => {
                            cells.push(format!("{:02X}", original));
                            ascii.push(printable_ascii(original));
                        }
                    }
                }

                HexRow { offset, cells, ascii }
            })
            .collect()
    }

    /// 渲染为多行文本
    pub fn render(&self, buffer: &[u8], range: SourceRange, overlay: Option<&EditOverlay>) -> String {
        self.rows(buffer, range, overlay)
            .iter()
            .map(|row| row.render(self.bytes_per_line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 分页加载游标
///
/// 每次交出下一段 `page_size` 字节的窗口，直到文件末尾。
#[derive(Debug, Clone)]
pub struct PageCursor {
    total_len: u64,
    page_size: u64,
    loaded: u64,
}

impl PageCursor {
    pub fn new(total_len: u64, page_size: u64) -> Self {
        Self {
            total_len,
            page_size: page_size.max(1),
            loaded: 0,
        }
    }

    pub fn from_config(total_len: u64, config: &ViewerConfig) -> Self {
        Self::new(total_len, config.page_size() as u64)
    }

    /// 已加载到的偏移（不含）
    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    pub fn is_exhausted(&self) -> bool {
        self.loaded >= self.total_len
    }

    pub fn next_page(&mut self) -> Option<SourceRange> {
        self.advance(1)
    }

    /// 加载到能显示 `offset` 为止，返回新加载的窗口
    ///
    /// `offset` 已经加载或超出文件时返回 None。
    pub fn seek_to(&mut self, offset: u64) -> Option<SourceRange> {
        if offset < self.loaded || offset >= self.total_len {
            return None;
        }
        let pages = (offset - self.loaded) / self.page_size + 1;
        self.advance(pages)
    }

    fn advance(&mut self, pages: u64) -> Option<SourceRange> {
        if self.is_exhausted() {
            return None;
        }
        let end = pages
            .saturating_mul(self.page_size)
            .saturating_add(self.loaded)
            .min(self.total_len);
        let window = SourceRange::try_new(self.loaded, end)?;
        self.loaded = end;
        Some(window)
    }
}
