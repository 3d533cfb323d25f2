/// 字节级编辑覆盖层
///
/// 按文件绝对偏移记录尚未保存的修改，与格式描述无关。
/// 每个偏移最多一条记录，后写入的覆盖先写入的。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utils::{parse_hex_byte, InvalidByteText};

/// 单个偏移上的编辑
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteEdit {
    /// 改写为新值
    Overwrite(u8),
    /// 删除该字节
    Delete,
}

/// 编辑覆盖层
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOverlay {
    edits: BTreeMap<u64, ByteEdit>,
}

/// 覆盖层快照（用于界面恢复）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySnapshot {
    /// 被删除的偏移，升序
    pub removed: Vec<u64>,
    /// 被改写的字节，升序
    pub modified: Vec<ModifiedByte>,
}

/// 被改写的单个字节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedByte {
    pub offset: u64,
    /// 两位大写十六进制
    pub data: String,
}

impl EditOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录改写；文本必须恰好是两位十六进制数字，否则覆盖层保持不变
    pub fn record_overwrite(&mut self, offset: u64, hex_text: &str) -> Result<(), InvalidByteText> {
        let value = parse_hex_byte(hex_text)?;
        self.record_overwrite_byte(offset, value);
        Ok(())
    }

    pub fn record_overwrite_byte(&mut self, offset: u64, value: u8) {
        self.edits.insert(offset, ByteEdit::Overwrite(value));
    }

    pub fn record_delete(&mut self, offset: u64) {
        self.edits.insert(offset, ByteEdit::Delete);
    }

    pub fn get(&self, offset: u64) -> Option<ByteEdit> {
        self.edits.get(&offset).copied()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// 按偏移升序遍历
    pub fn iter(&self) -> impl Iterator<Item = (u64, ByteEdit)> + '_ {
        self.edits.iter().map(|(&offset, &edit)| (offset, edit))
    }

    /// 所有改写，按偏移升序
    pub fn overwrites(&self) -> impl Iterator<Item = (u64, u8)> + '_ {
        self.iter().filter_map(|(offset, edit)| match edit {
            ByteEdit::Overwrite(value) => Some((offset, value)),
            ByteEdit::Delete => None,
        })
    }

    /// 所有删除偏移，升序
    pub fn deletions(&self) -> impl Iterator<Item = u64> + '_ {
        self.iter()
            .filter(|(_, edit)| *edit == ByteEdit::Delete)
            .map(|(offset, _)| offset)
    }

    /// 清空整个会话的编辑
    pub fn reset(&mut self) {
        self.edits.clear();
    }

    /// 按类型拆分的完整快照
    pub fn snapshot(&self) -> OverlaySnapshot {
        let mut snapshot = OverlaySnapshot::default();
        for (offset, edit) in self.iter() {
            match edit {
                ByteEdit::Delete => snapshot.removed.push(offset),
                ByteEdit::Overwrite(value) => snapshot.modified.push(ModifiedByte {
                    offset,
                    data: format!("{:02X}", value),
                }),
            }
        }
        snapshot
    }
}

impl OverlaySnapshot {
    /// 从快照重建覆盖层；同一偏移同时出现在两个列表时以删除为准
    pub fn restore(&self) -> Result<EditOverlay, InvalidByteText> {
        let mut overlay = EditOverlay::new();
        for modified in &self.modified {
            overlay.record_overwrite(modified.offset, &modified.data)?;
        }
        for &offset in &self.removed {
            overlay.record_delete(offset);
        }
        Ok(overlay)
    }
}

impl std::fmt::Display for ByteEdit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteEdit::Overwrite(value) => write!(f, "{:02X}", value),
            ByteEdit::Delete => write!(f, "--"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_overwrite() {
        let mut overlay = EditOverlay::new();
        overlay.record_overwrite(10, "AB").unwrap();
        overlay.record_overwrite(11, "0f").unwrap();

        assert_eq!(overlay.get(10), Some(ByteEdit::Overwrite(0xAB)));
        assert_eq!(overlay.get(11), Some(ByteEdit::Overwrite(0x0F)));
        assert_eq!(overlay.len(), 2);
    }

    #[test]
    fn test_malformed_text_leaves_overlay_untouched() {
        let mut overlay = EditOverlay::new();
        overlay.record_overwrite(3, "11").unwrap();

        for text in ["G1", "A", "ABC"] {
            let result = overlay.record_overwrite(3, text);
            assert_eq!(result, Err(InvalidByteText(text.to_string())));
        }

        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.get(3), Some(ByteEdit::Overwrite(0x11)));
    }

    #[test]
    fn test_last_write_wins() {
        let mut overlay = EditOverlay::new();
        overlay.record_overwrite(5, "01").unwrap();
        overlay.record_overwrite(5, "02").unwrap();

        let snapshot = overlay.snapshot();
        assert!(snapshot.removed.is_empty());
        assert_eq!(
            snapshot.modified,
            vec![ModifiedByte {
                offset: 5,
                data: "02".to_string(),
            }]
        );
    }

    #[test]
    fn test_delete_replaces_overwrite_and_back() {
        let mut overlay = EditOverlay::new();
        overlay.record_overwrite(7, "FF").unwrap();
        overlay.record_delete(7);
        assert_eq!(overlay.get(7), Some(ByteEdit::Delete));

        overlay.record_overwrite(7, "EE").unwrap();
        assert_eq!(overlay.get(7), Some(ByteEdit::Overwrite(0xEE)));
        assert_eq!(overlay.deletions().count(), 0);
    }

    #[test]
    fn test_snapshot_partitions_and_orders() {
        let mut overlay = EditOverlay::new();
        overlay.record_delete(9);
        overlay.record_overwrite(4, "aa").unwrap();
        overlay.record_delete(2);
        overlay.record_overwrite(1, "10").unwrap();

        let snapshot = overlay.snapshot();
        assert_eq!(snapshot.removed, vec![2, 9]);
        let modified: Vec<_> = snapshot.modified.iter().map(|m| (m.offset, m.data.as_str())).collect();
        assert_eq!(modified, vec![(1, "10"), (4, "AA")]);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut overlay = EditOverlay::new();
        overlay.record_delete(3);
        overlay.record_overwrite(8, "7F").unwrap();

        let json = serde_json::to_value(overlay.snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "removed": [3],
                "modified": [{ "offset": 8, "data": "7F" }]
            })
        );
    }

    #[test]
    fn test_snapshot_restore() {
        let mut overlay = EditOverlay::new();
        overlay.record_delete(3);
        overlay.record_overwrite(8, "7F").unwrap();

        let restored = overlay.snapshot().restore().unwrap();
        assert_eq!(restored, overlay);

        let bad = OverlaySnapshot {
            removed: vec![],
            modified: vec![ModifiedByte {
                offset: 0,
                data: "XYZ".to_string(),
            }],
        };
        assert!(bad.restore().is_err());
    }

    #[test]
    fn test_reset() {
        let mut overlay = EditOverlay::new();
        overlay.record_delete(1);
        overlay.record_overwrite(2, "00").unwrap();
        overlay.reset();

        assert!(overlay.is_empty());
        assert_eq!(overlay.snapshot(), OverlaySnapshot::default());
    }
}
