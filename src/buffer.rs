use memmap2::Mmap;
use std::ops::Deref;

/// 打开的文件内容
///
/// 可以是内存中的字节数组，也可以是只读的内存映射。
/// 解析引擎只把它当作 `&[u8]` 使用，从不原地修改。
#[derive(Debug)]
pub enum BinaryBuffer {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl BinaryBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BinaryBuffer::Owned(bytes) => bytes,
            BinaryBuffer::Mapped(mmap) => &mmap[..],
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, BinaryBuffer::Mapped(_))
    }

    /// 把内存映射复制为自有数据
    ///
    /// 原地覆盖被映射的文件之前必须先调用，否则映射会随文件一起被截断。
    pub fn detach(&mut self) {
        if let BinaryBuffer::Mapped(mmap) = self {
            *self = BinaryBuffer::Owned(mmap.to_vec());
        }
    }
}

impl Deref for BinaryBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for BinaryBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Vec<u8>> for BinaryBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        BinaryBuffer::Owned(bytes)
    }
}
