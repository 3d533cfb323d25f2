/// 保存时的缓冲区重建
///
/// 以原始缓冲区为基础：先写入所有改写，再按升序剔除被删除的字节。
/// 原始缓冲区和覆盖层都不会被修改，保存后可以继续编辑。

use super::overlay::EditOverlay;

/// 重建器
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconstructor;

impl Reconstructor {
    /// 生成要写入磁盘的新缓冲区
    ///
    /// 超出原始缓冲区范围的编辑不产生任何字节。
    pub fn reconstruct(original: &[u8], overlay: &EditOverlay) -> Vec<u8> {
        let mut working = original.to_vec();

        // 不同偏移上的改写互不影响，顺序无关
        for (offset, value) in overlay.overwrites() {
            if let Some(byte) = usize::try_from(offset).ok().and_then(|idx| working.get_mut(idx)) {
                *byte = value;
            }
        }

        let deleted: Vec<usize> = overlay
            .deletions()
            .filter_map(|offset| usize::try_from(offset).ok())
            .take_while(|&offset| offset < working.len())
            .collect();

        if deleted.is_empty() {
            return working;
        }

        let mut output = Vec::with_capacity(working.len() - deleted.len());
        let mut cursor = 0usize;
        for offset in deleted {
            output.extend_from_slice(&working[cursor..offset]);
            cursor = offset + 1;
        }
        output.extend_from_slice(&working[cursor..]);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]
    }

    #[test]
    fn test_empty_overlay_round_trip() {
        let original = sample();
        let output = Reconstructor::reconstruct(&original, &EditOverlay::new());
        assert_eq!(output, original);
    }

    #[test]
    fn test_delete_compaction() {
        let mut overlay = EditOverlay::new();
        overlay.record_delete(5);
        overlay.record_delete(2);

        let output = Reconstructor::reconstruct(&sample(), &overlay);
        assert_eq!(output, vec![0x00, 0x01, 0x03, 0x04, 0x06]);
    }

    #[test]
    fn test_overwrite_applied() {
        let original: Vec<u8> = (0..16).collect();
        let mut overlay = EditOverlay::new();
        overlay.record_overwrite(10, "AB").unwrap();

        let output = Reconstructor::reconstruct(&original, &overlay);
        assert_eq!(output[10], 0xAB);
        assert_eq!(output.len(), original.len());
    }

    #[test]
    fn test_overwrite_and_delete_mixed() {
        let mut overlay = EditOverlay::new();
        overlay.record_overwrite(1, "FF").unwrap();
        overlay.record_delete(0);
        overlay.record_overwrite(6, "EE").unwrap();
        overlay.record_delete(3);

        let output = Reconstructor::reconstruct(&sample(), &overlay);
        assert_eq!(output, vec![0xFF, 0x02, 0x04, 0x05, 0xEE]);
    }

    #[test]
    fn test_adjacent_and_edge_deletes() {
        let mut overlay = EditOverlay::new();
        for offset in [0, 1, 2, 6] {
            overlay.record_delete(offset);
        }

        let output = Reconstructor::reconstruct(&sample(), &overlay);
        assert_eq!(output, vec![0x03, 0x04, 0x05]);
    }

    #[test]
    fn test_delete_everything() {
        let mut overlay = EditOverlay::new();
        for offset in 0..7 {
            overlay.record_delete(offset);
        }
        assert!(Reconstructor::reconstruct(&sample(), &overlay).is_empty());
    }

    #[test]
    fn test_edits_beyond_buffer_ignored() {
        let mut overlay = EditOverlay::new();
        overlay.record_overwrite(100, "AA").unwrap();
        overlay.record_delete(200);
        overlay.record_delete(1);

        let output = Reconstructor::reconstruct(&sample(), &overlay);
        assert_eq!(output, vec![0x00, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn test_length_invariant_and_idempotence() {
        let original: Vec<u8> = (0..=255).collect();
        let mut overlay = EditOverlay::new();
        for offset in (0..256).step_by(7) {
            overlay.record_delete(offset);
        }
        // 重复删除同一偏移只算一次
        overlay.record_delete(7);
        overlay.record_overwrite(8, "00").unwrap();

        let deleted = overlay.deletions().count();
        let first = Reconstructor::reconstruct(&original, &overlay);
        let second = Reconstructor::reconstruct(&original, &overlay);

        assert_eq!(first.len(), original.len() - deleted);
        assert_eq!(first, second);
        // 输入保持不变
        assert_eq!(original, (0..=255).collect::<Vec<u8>>());
    }
}
