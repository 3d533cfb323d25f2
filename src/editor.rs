/// 编辑器层模块
///
/// 该模块提供字节级编辑的追踪与保存。
/// 遵循"修改-保存分离"原则，所有修改操作仅在内存中进行，需要显式调用保存。
///
/// # 架构设计
///
/// - **overlay**: 编辑覆盖层，按偏移记录改写和删除
/// - **reconstruct**: 根据原始内容和覆盖层生成保存用的缓冲区
/// - **binary_editor**: 编辑会话，管理一个文件的修改状态
///
/// # 使用示例
///
/// ```rust,ignore
/// use hexmeta::BinaryEditor;
/// use hexmeta::io::{DefaultBinaryReader, DefaultBinaryWriter};
///
/// // 加载 + 编辑 + 保存工作流
/// let mut editor = BinaryEditor::open(&DefaultBinaryReader, "firmware.bin")?;
///
/// editor.record_overwrite(0x10, "AB")?;
/// println!("修改了 {} 处", editor.modified_count());
///
/// editor.save(&DefaultBinaryWriter, Path::new("firmware.patched.bin"))?;
/// ```
pub mod binary_editor;
pub mod overlay;
pub mod reconstruct;

// === 导出公共接口 ===
pub use binary_editor::BinaryEditor;
pub use overlay::{ByteEdit, EditOverlay, ModifiedByte, OverlaySnapshot};
pub use reconstruct::Reconstructor;
