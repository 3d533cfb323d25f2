/// 二进制文件 IO 实现
///
/// 提供基于文件系统的默认读写实现
use std::path::Path;

use memmap2::Mmap;

use super::traits::{BinaryReader, BinaryWriter};
use crate::buffer::BinaryBuffer;
use crate::utils::HexMetaError;

/// 默认的文件读取器（基于 std::fs，整个文件读入内存）
#[derive(Debug, Clone, Default)]
pub struct DefaultBinaryReader;

impl BinaryReader for DefaultBinaryReader {
    fn read(&self, path: &Path) -> Result<BinaryBuffer, HexMetaError> {
        let bytes = std::fs::read(path)?;
        Ok(BinaryBuffer::Owned(bytes))
    }
}

/// 内存映射读取器（只读，适合大文件浏览）
#[derive(Debug, Clone, Default)]
pub struct MappedBinaryReader;

impl BinaryReader for MappedBinaryReader {
    fn read(&self, path: &Path) -> Result<BinaryBuffer, HexMetaError> {
        let file = std::fs::File::open(path)?;
        // 空文件无法映射
        if file.metadata()?.len() == 0 {
            return Ok(BinaryBuffer::Owned(Vec::new()));
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(BinaryBuffer::Mapped(mmap))
    }
}

/// 默认的文件写入器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultBinaryWriter;

impl BinaryWriter for DefaultBinaryWriter {
    fn write(&self, data: &[u8], path: &Path) -> Result<(), HexMetaError> {
        // 确保父目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, data)?;
        Ok(())
    }
}
