/// 文件内的半开字节区间 `[start, end)`
///
/// 每次解析字段几何信息时新建，创建后不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct SourceRange {
    start: u64,
    end: u64,
}

impl SourceRange {
    /// 创建区间，`start > end` 时返回 None
    pub fn try_new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// 由起点和长度创建区间，溢出时返回 None
    pub fn from_len(start: u64, len: u64) -> Option<Self> {
        start.checked_add(len).map(|end| Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }

    /// 与 `[0, limit)` 求交集
    pub fn clamp_to(&self, limit: u64) -> Self {
        let end = self.end.min(limit);
        Self {
            start: self.start.min(end),
            end,
        }
    }

    /// 转换为切片下标区间；超出 `buffer_len` 时返回 None
    pub fn to_slice_range(&self, buffer_len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(self.start).ok()?;
        let end = usize::try_from(self.end).ok()?;
        (end <= buffer_len).then_some(start..end)
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[0x{:08X}, 0x{:08X})", self.start, self.end)
    }
}
