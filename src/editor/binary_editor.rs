/// 二进制文件编辑会话
///
/// 持有打开的文件内容和它的编辑覆盖层，提供"修改-保存分离"的编辑接口。

use std::path::{Path, PathBuf};

use super::overlay::{EditOverlay, OverlaySnapshot};
use super::reconstruct::Reconstructor;
use crate::buffer::BinaryBuffer;
use crate::format::FormatDescription;
use crate::io::{BinaryReader, BinaryWriter};
use crate::range::SourceRange;
use crate::utils::HexMetaError;
use crate::view::{ResolveOptions, ResolvedView};

/// 编辑会话 - 管理一个文件的修改状态
///
/// # 核心特性
/// - **Stateful**: 维护修改状态，支持多次修改后统一保存
/// - **非破坏性保存**: 保存后原始内容和覆盖层都保留，可以继续编辑
/// - **隔离性**: 每个会话拥有独立的缓冲区和覆盖层
///
/// # 使用示例
///
/// ```rust,ignore
/// use hexmeta::BinaryEditor;
/// use hexmeta::io::{DefaultBinaryReader, DefaultBinaryWriter};
///
/// let mut editor = BinaryEditor::open(&DefaultBinaryReader, "a.out")?;
/// editor.record_overwrite(0x10, "AB")?;
/// editor.record_delete(0x20)?;
/// editor.save(&DefaultBinaryWriter, Path::new("a.patched"))?;
/// ```
pub struct BinaryEditor {
    /// 源文件路径
    path: PathBuf,
    /// 原始内容
    buffer: BinaryBuffer,
    /// 未保存的编辑
    overlay: EditOverlay,
}

impl BinaryEditor {
    pub fn new(path: impl Into<PathBuf>, buffer: BinaryBuffer) -> Self {
        Self {
            path: path.into(),
            buffer,
            overlay: EditOverlay::new(),
        }
    }

    /// 通过 reader 打开文件
    pub fn open(reader: &dyn BinaryReader, path: impl Into<PathBuf>) -> Result<Self, HexMetaError> {
        let path = path.into();
        let buffer = reader.read(&path)?;
        Ok(Self::new(path, buffer))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 原始内容（不含未保存的编辑）
    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    pub fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn check_offset(&self, offset: u64) -> Result<(), HexMetaError> {
        if offset >= self.len() {
            return Err(HexMetaError::OffsetOutOfRange {
                offset,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// 改写一个字节（仅修改内存状态）
    pub fn record_overwrite(&mut self, offset: u64, hex_text: &str) -> Result<(), HexMetaError> {
        self.check_offset(offset)?;
        self.overlay.record_overwrite(offset, hex_text)?;
        Ok(())
    }

    /// 删除一个字节（仅修改内存状态）
    pub fn record_delete(&mut self, offset: u64) -> Result<(), HexMetaError> {
        self.check_offset(offset)?;
        self.overlay.record_delete(offset);
        Ok(())
    }

    pub fn overlay(&self) -> &EditOverlay {
        &self.overlay
    }

    pub fn snapshot_overlay(&self) -> OverlaySnapshot {
        self.overlay.snapshot()
    }

    /// 用快照替换当前覆盖层；任何一项非法时保持原状态
    pub fn restore_overlay(&mut self, snapshot: &OverlaySnapshot) -> Result<(), HexMetaError> {
        let restored = snapshot.restore()?;
        if let Some((offset, _)) = restored.iter().find(|(offset, _)| *offset >= self.len()) {
            return Err(HexMetaError::OffsetOutOfRange {
                offset,
                len: self.len(),
            });
        }
        self.overlay = restored;
        Ok(())
    }

    /// 生成保存用的缓冲区
    pub fn reconstruct(&self) -> Vec<u8> {
        Reconstructor::reconstruct(self.bytes(), &self.overlay)
    }

    /// 保存到文件（需要显式调用）
    ///
    /// 写入失败时覆盖层保持不变，可以重试。
    ///
    /// # 参数
    /// * `writer` - 文件写入器
    /// * `path` - 目标文件路径
    pub fn save(&mut self, writer: &dyn BinaryWriter, path: &Path) -> Result<(), HexMetaError> {
        let output = self.reconstruct();

        // 覆盖正在映射的源文件前先复制一份
        if self.buffer.is_mapped() && is_same_file(path, &self.path) {
            self.buffer.detach();
        }

        writer.write(&output, path)?;

        #[cfg(debug_assertions)]
        eprintln!("💾 已保存 {} 字节到 {:?}", output.len(), path);

        Ok(())
    }

    /// 保存到原路径
    pub fn save_to_original(&mut self, writer: &dyn BinaryWriter) -> Result<(), HexMetaError> {
        let path = self.path.clone();
        self.save(writer, &path)
    }

    /// 读取原始内容中的任意区间
    pub fn read_range(&self, range: SourceRange) -> Option<&[u8]> {
        let bytes = self.bytes();
        range.to_slice_range(bytes.len()).map(|r| &bytes[r])
    }

    /// 在原始内容上创建字段解析视图
    pub fn view<'a>(&'a self, format: &'a FormatDescription, options: ResolveOptions) -> ResolvedView<'a> {
        ResolvedView::with_options(format, self.bytes(), options)
    }

    /// 检查是否有修改
    pub fn is_modified(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// 获取修改数量
    pub fn modified_count(&self) -> usize {
        self.overlay.len()
    }

    /// 清除所有编辑
    pub fn reset(&mut self) {
        self.overlay.reset();
    }

    /// 生成编辑摘要
    pub fn summary(&self) -> String {
        let deleted = self.overlay.deletions().count();
        format!(
            "文件: {}, 大小: {} bytes, 修改状态: {}, 改写: {}, 删除: {}",
            self.path.display(),
            self.len(),
            if self.is_modified() { "已修改" } else { "未修改" },
            self.overlay.len() - deleted,
            deleted
        )
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
