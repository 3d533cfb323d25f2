/// 字段几何解析视图
///
/// 把 [`FormatDescription`] 绑定到一块缓冲区上，按需计算每个字段的偏移、长度
/// 和数组维度，并按字段缓存结果。缓存只对当前绑定的缓冲区有效，
/// 换绑（[`ResolvedView::rebind`]）时整体清空。
///
/// 无法确定的几何信息返回 `None`，这是正常结果而不是错误：
/// 格式描述中的可选、变长结构并不总能在某个具体文件上解析出来。
use std::cell::RefCell;

use crate::datatypes::{read_le_uint, DEFAULT_MAX_REFERENCE_WIDTH};
use crate::format::{FieldId, FormatDescription};
use crate::range::SourceRange;

/// 解析参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// 引用值解码的最大字节宽度
    pub max_reference_width: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_reference_width: DEFAULT_MAX_REFERENCE_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Memo {
    #[default]
    Unvisited,
    InProgress,
    /// 仍在计算中，但已确认位于循环依赖上，完成时一律记为 None
    Cyclic,
    Done(Option<u64>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldMemo {
    offset: Memo,
    length: Memo,
    element_size: Memo,
    element_count: Memo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Offset,
    Length,
    ElementSize,
    ElementCount,
}

impl FieldMemo {
    fn slot_mut(&mut self, quantity: Quantity) -> &mut Memo {
        match quantity {
            Quantity::Offset => &mut self.offset,
            Quantity::Length => &mut self.length,
            Quantity::ElementSize => &mut self.element_size,
            Quantity::ElementCount => &mut self.element_count,
        }
    }
}

/// 绑定了缓冲区的解析视图
#[derive(Debug)]
pub struct ResolvedView<'a> {
    format: &'a FormatDescription,
    buffer: &'a [u8],
    options: ResolveOptions,
    memo: RefCell<Vec<FieldMemo>>,
    /// 正在计算的 (字段, 量) 调用栈
    active: RefCell<Vec<(usize, Quantity)>>,
}

impl<'a> ResolvedView<'a> {
    pub fn new(format: &'a FormatDescription, buffer: &'a [u8]) -> Self {
        Self::with_options(format, buffer, ResolveOptions::default())
    }

    pub fn with_options(
        format: &'a FormatDescription,
        buffer: &'a [u8],
        options: ResolveOptions,
    ) -> Self {
        Self {
            format,
            buffer,
            options,
            memo: RefCell::new(vec![FieldMemo::default(); format.len()]),
            active: RefCell::new(Vec::new()),
        }
    }

    pub fn format(&self) -> &'a FormatDescription {
        self.format
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// 换绑缓冲区，清空所有缓存
    pub fn rebind(&mut self, buffer: &'a [u8]) {
        self.buffer = buffer;
        self.invalidate();
    }

    pub fn invalidate(&mut self) {
        self.memo.get_mut().fill(FieldMemo::default());
        self.active.get_mut().clear();
    }

    /// 字段的绝对偏移
    ///
    /// 依次尝试：基准字段偏移 + 相对偏移、上一个字段的结束位置、
    /// `Offset` 引用值。没有任何锚点和引用的字段偏移为 0。
    pub fn resolve_offset(&self, field: FieldId) -> Option<u64> {
        self.memoized(field, Quantity::Offset, |view| view.compute_offset(field))
    }

    /// 字段长度：声明长度、`Length` 引用值，数组则为元素大小 × 元素个数
    pub fn resolve_length(&self, field: FieldId) -> Option<u64> {
        self.memoized(field, Quantity::Length, |view| view.compute_length(field))
    }

    pub fn resolve_element_size(&self, field: FieldId) -> Option<u64> {
        self.memoized(field, Quantity::ElementSize, |view| {
            view.reference_value(view.format.field(field).reference_targets.element_size?)
        })
    }

    pub fn resolve_element_count(&self, field: FieldId) -> Option<u64> {
        self.memoized(field, Quantity::ElementCount, |view| {
            view.reference_value(view.format.field(field).reference_targets.element_count?)
        })
    }

    /// 字段对应的字节区间；数组返回整个数组的跨度
    pub fn raw_range(&self, field: FieldId) -> Option<SourceRange> {
        let offset = self.resolve_offset(field)?;
        let length = if self.format.get(field)?.is_array() {
            self.array_span(field)?
        } else {
            self.resolve_length(field)?
        };
        SourceRange::from_len(offset, length)
    }

    /// 数组第 `index` 个元素的整个槽位
    pub fn entry_slot(&self, field: FieldId, index: u64) -> Option<SourceRange> {
        if !self.format.get(field)?.is_array() {
            return None;
        }

        let element_size = self.resolve_element_size(field)?;
        let element_count = self.resolve_element_count(field)?;
        if index >= element_count {
            return None;
        }

        let start = index
            .checked_mul(element_size)?
            .checked_add(self.resolve_offset(field)?)?;
        SourceRange::from_len(start, element_size)
    }

    /// 数组第 `index` 个元素内每个模板子字段的区间
    ///
    /// 没有条目模板时，整个元素槽位作为一个不透明区间返回。
    pub fn entry_ranges(&self, field: FieldId, index: u64) -> Option<Vec<SourceRange>> {
        let slot = self.entry_slot(field, index)?;
        let templates = self.format.field(field).entry_templates();
        if templates.is_empty() {
            return Some(vec![slot]);
        }

        templates
            .iter()
            .map(|template| {
                SourceRange::from_len(slot.start().checked_add(template.relative_offset)?, template.length)
            })
            .collect()
    }

    /// 按字段 id 解析区间
    pub fn resolve_range(&self, field_id: &str) -> Option<SourceRange> {
        self.raw_range(self.format.lookup(field_id)?)
    }

    /// 按字段 id 解析数组元素的子区间
    pub fn resolve_entry_ranges(&self, field_id: &str, index: u64) -> Option<Vec<SourceRange>> {
        self.entry_ranges(self.format.lookup(field_id)?, index)
    }

    /// 读取任意区间的字节；区间超出缓冲区时返回 None
    pub fn read(&self, range: SourceRange) -> Option<&'a [u8]> {
        let buffer = self.buffer;
        range.to_slice_range(buffer.len()).map(|r| &buffer[r])
    }

    /// 字段当前的字节内容
    pub fn field_bytes(&self, field: FieldId) -> Option<&'a [u8]> {
        self.read(self.raw_range(field)?)
    }

    /// 字段的值按小端整数解码（宽度受 `max_reference_width` 限制）
    pub fn field_value(&self, field: FieldId) -> Option<u64> {
        read_le_uint(self.field_bytes(field)?, self.options.max_reference_width)
    }

    fn compute_offset(&self, field: FieldId) -> Option<u64> {
        let descriptor = self.format.field(field);

        if let Some(base) = descriptor.base_offset_field {
            if let Some(base_offset) = self.resolve_offset(base) {
                return base_offset.checked_add(descriptor.relative_offset);
            }
        }

        if let Some(previous) = descriptor.previous_field {
            if let (Some(offset), Some(length)) =
                (self.resolve_offset(previous), self.resolve_length(previous))
            {
                return offset.checked_add(length);
            }
        }

        if let Some(target) = descriptor.reference_targets.offset {
            return self.reference_value(target);
        }

        // 有锚点但锚点无法解析时，不能退回到 0
        match (descriptor.base_offset_field, descriptor.previous_field) {
            (None, None) => Some(0),
            _ => None,
        }
    }

    fn compute_length(&self, field: FieldId) -> Option<u64> {
        let descriptor = self.format.field(field);

        if let Some(length) = descriptor.declared_length {
            return Some(length);
        }
        if let Some(target) = descriptor.reference_targets.length {
            return self.reference_value(target);
        }
        if descriptor.is_array() {
            return self.array_span(field);
        }
        None
    }

    fn array_span(&self, field: FieldId) -> Option<u64> {
        self.resolve_element_size(field)?
            .checked_mul(self.resolve_element_count(field)?)
    }

    fn reference_value(&self, target: FieldId) -> Option<u64> {
        self.field_value(target)
    }

    /// 不属于当前格式描述的 `field` 直接返回 None
    fn memoized(
        &self,
        field: FieldId,
        quantity: Quantity,
        compute: impl FnOnce(&Self) -> Option<u64>,
    ) -> Option<u64> {
        let state = {
            let mut memo = self.memo.borrow_mut();
            let slot = memo.get_mut(field.0)?.slot_mut(quantity);
            let state = *slot;
            if state == Memo::Unvisited {
                *slot = Memo::InProgress;
            }
            state
        };

        match state {
            Memo::Done(value) => return value,
            Memo::InProgress | Memo::Cyclic => {
                #[cfg(debug_assertions)]
                eprintln!(
                    "⚠️  字段 {} 的 {:?} 存在循环依赖",
                    self.format.field(field).id(),
                    quantity
                );
                self.mark_cycle((field.0, quantity));
                return None;
            }
            Memo::Unvisited => {}
        }

        self.active.borrow_mut().push((field.0, quantity));
        let value = compute(self);
        self.active.borrow_mut().pop();

        let mut memo = self.memo.borrow_mut();
        let slot = memo.get_mut(field.0)?.slot_mut(quantity);
        let value = if *slot == Memo::Cyclic { None } else { value };
        *slot = Memo::Done(value);
        value
    }

    /// 把从 `key` 到栈顶的整条环标记为循环，结果与查询顺序无关
    fn mark_cycle(&self, key: (usize, Quantity)) {
        let active = self.active.borrow();
        let Some(start) = active.iter().position(|entry| *entry == key) else {
            return;
        };

        let mut memo = self.memo.borrow_mut();
        for &(field, quantity) in &active[start..] {
            if let Some(entry) = memo.get_mut(field) {
                *entry.slot_mut(quantity) = Memo::Cyclic;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FieldKind, FieldSpec, FormatSpec, ValueKind};

    fn build(fields: Vec<FieldSpec>) -> FormatDescription {
        FormatDescription::build(&FormatSpec {
            name: "test".to_string(),
            label: String::new(),
            fields,
        })
        .unwrap()
    }

    fn range(start: u64, end: u64) -> SourceRange {
        SourceRange::try_new(start, end).unwrap()
    }

    #[test]
    fn test_fixed_offsets_need_no_buffer() {
        let format = build(vec![
            FieldSpec::fixed("magic", 4),
            FieldSpec::fixed("version", 2),
            FieldSpec::fixed("flags", 2),
            FieldSpec::fixed("entry", 8),
        ]);
        let view = ResolvedView::new(&format, &[]);

        assert_eq!(view.resolve_range("magic"), Some(range(0, 4)));
        assert_eq!(view.resolve_range("version"), Some(range(4, 6)));
        assert_eq!(view.resolve_range("flags"), Some(range(6, 8)));
        assert_eq!(view.resolve_range("entry"), Some(range(8, 16)));
    }

    #[test]
    fn test_length_reference_and_following_pivot() {
        let format = build(vec![
            FieldSpec::fixed("name_len", 1).with_value_kind(ValueKind::Length),
            FieldSpec::variable("name").refer("name_len"),
            FieldSpec::fixed("crc", 2),
            FieldSpec::fixed("tail", 1),
        ]);
        let buffer = [3, b'a', b'b', b'c', 0xAA, 0xBB, 0xCC];
        let view = ResolvedView::new(&format, &buffer);

        assert_eq!(view.resolve_range("name"), Some(range(1, 4)));
        assert_eq!(view.resolve_range("crc"), Some(range(4, 6)));
        assert_eq!(view.resolve_range("tail"), Some(range(6, 7)));
        assert_eq!(view.read(range(1, 4)), Some(&b"abc"[..]));
    }

    fn array_format() -> FormatDescription {
        build(vec![
            FieldSpec::fixed("table_off", 1).with_value_kind(ValueKind::Offset),
            FieldSpec::fixed("count", 1).with_value_kind(ValueKind::ArrayElementCount),
            FieldSpec::fixed("size", 1).with_value_kind(ValueKind::ArrayElementSize),
            FieldSpec::variable("table")
                .with_kind(FieldKind::Array)
                .refer("table_off")
                .refer("count")
                .refer("size")
                .with_entry("kind", 2)
                .with_entry("value", 2),
        ])
    }

    fn array_buffer() -> Vec<u8> {
        let mut buffer = vec![0u8; 120];
        buffer[0] = 100;
        buffer[1] = 3;
        buffer[2] = 4;
        buffer
    }

    #[test]
    fn test_array_geometry() {
        let format = array_format();
        let buffer = array_buffer();
        let view = ResolvedView::new(&format, &buffer);
        let table = format.lookup("table").unwrap();

        assert_eq!(view.resolve_offset(table), Some(100));
        assert_eq!(view.resolve_element_size(table), Some(4));
        assert_eq!(view.resolve_element_count(table), Some(3));
        assert_eq!(view.raw_range(table), Some(range(100, 112)));

        let entries = view.entry_ranges(table, 1).unwrap();
        assert_eq!(entries, vec![range(104, 106), range(106, 108)]);

        assert_eq!(view.entry_slot(table, 2), Some(range(108, 112)));
        assert_eq!(view.entry_ranges(table, 3), None);
    }

    #[test]
    fn test_array_without_templates_uses_slot() {
        let format = build(vec![
            FieldSpec::fixed("count", 1).with_value_kind(ValueKind::ArrayElementCount),
            FieldSpec::fixed("size", 1).with_value_kind(ValueKind::ArrayElementSize),
            FieldSpec::variable("items")
                .with_kind(FieldKind::Array)
                .refer("count")
                .refer("size"),
            FieldSpec::fixed("end", 1),
        ]);
        let buffer = [2, 3, 1, 1, 1, 2, 2, 2, 0xFF];
        let view = ResolvedView::new(&format, &buffer);

        assert_eq!(view.resolve_entry_ranges("items", 1), Some(vec![range(5, 8)]));
        // 数组后面的字段跟在整个数组之后
        assert_eq!(view.resolve_range("end"), Some(range(8, 9)));
    }

    #[test]
    fn test_array_unknown_dimension_has_no_geometry() {
        let format = build(vec![
            FieldSpec::fixed("size", 1).with_value_kind(ValueKind::ArrayElementSize),
            FieldSpec::variable("items").with_kind(FieldKind::Array).refer("size"),
        ]);
        let view = ResolvedView::new(&format, &[4]);

        assert_eq!(view.resolve_range("items"), None);
        assert_eq!(view.resolve_entry_ranges("items", 0), None);
    }

    #[test]
    fn test_entry_ranges_on_plain_field() {
        let format = build(vec![FieldSpec::fixed("a", 4)]);
        let view = ResolvedView::new(&format, &[0; 4]);
        assert_eq!(view.resolve_entry_ranges("a", 0), None);
    }

    #[test]
    fn test_unresolved_offset_reference_is_absent() {
        let format = build(vec![
            FieldSpec::variable("ptr").with_value_kind(ValueKind::Offset),
            FieldSpec::fixed("data", 4).refer("ptr"),
        ]);
        let view = ResolvedView::new(&format, &[0; 16]);

        assert_eq!(view.resolve_range("ptr"), None);
        assert_eq!(view.resolve_range("data"), None);
    }

    #[test]
    fn test_reference_outside_buffer_is_absent() {
        let format = build(vec![
            FieldSpec::fixed("pad", 8),
            FieldSpec::fixed("len", 2).with_value_kind(ValueKind::Length),
            FieldSpec::variable("body").refer("len"),
        ]);
        // 缓冲区只有 9 字节，len 字段越界
        let view = ResolvedView::new(&format, &[0; 9]);

        assert_eq!(view.resolve_range("len"), Some(range(8, 10)));
        assert_eq!(view.resolve_range("body"), None);
    }

    #[test]
    fn test_cyclic_reference_is_absent() {
        let format = build(vec![
            FieldSpec::variable("a").refer("b"),
            FieldSpec::fixed("b", 1).with_value_kind(ValueKind::Length),
        ]);
        let view = ResolvedView::new(&format, &[1, 2, 3]);

        assert_eq!(view.resolve_range("b"), None);
        assert_eq!(view.resolve_range("a"), None);
    }

    #[test]
    fn test_cycle_result_independent_of_query_order() {
        // a 的长度来自 f，f 锚定在 b 上，b 又跟在 a 之后
        let format = build(vec![
            FieldSpec::variable("a").refer("f"),
            FieldSpec::fixed("b", 1),
            FieldSpec::fixed("f", 1).with_value_kind(ValueKind::Length),
        ]);
        let buffer = [2u8, 0, 0, 0];
        let a = format.lookup("a").unwrap();
        let b = format.lookup("b").unwrap();
        let f = format.lookup("f").unwrap();

        let from_f = ResolvedView::new(&format, &buffer);
        assert_eq!(from_f.resolve_range("f"), None);
        assert_eq!(from_f.resolve_range("a"), None);

        let from_a = ResolvedView::new(&format, &buffer);
        assert_eq!(from_a.resolve_range("a"), None);
        assert_eq!(from_a.resolve_range("f"), None);

        assert_eq!(*from_f.memo.borrow(), *from_a.memo.borrow());
        let memo = from_a.memo.borrow();
        assert_eq!(memo[a.index()].length, Memo::Done(None));
        assert_eq!(memo[b.index()].offset, Memo::Done(None));
        assert_eq!(memo[f.index()].offset, Memo::Done(None));
        assert_eq!(memo[a.index()].offset, Memo::Done(Some(0)));
        assert!(from_a.active.borrow().is_empty());
    }

    #[test]
    fn test_foreign_field_id_is_absent() {
        let small = build(vec![FieldSpec::fixed("a", 1)]);
        let large = build(vec![
            FieldSpec::fixed("a", 1),
            FieldSpec::fixed("b", 1),
            FieldSpec::fixed("c", 1),
        ]);
        let foreign = large.lookup("c").unwrap();
        let view = ResolvedView::new(&small, &[0; 4]);

        assert_eq!(view.resolve_offset(foreign), None);
        assert_eq!(view.resolve_length(foreign), None);
        assert_eq!(view.raw_range(foreign), None);
        assert_eq!(view.entry_slot(foreign, 0), None);
        assert_eq!(view.entry_ranges(foreign, 0), None);
        assert_eq!(view.field_value(foreign), None);
        assert!(small.get(foreign).is_none());
    }

    #[test]
    fn test_reference_width_clamp() {
        let format = build(vec![
            FieldSpec::fixed("len", 8).with_value_kind(ValueKind::Length),
            FieldSpec::variable("body").refer("len"),
        ]);
        let mut buffer = vec![0u8; 16];
        buffer[0] = 4;
        buffer[6] = 0x01; // 第 7 个字节超出默认宽度，被忽略

        let view = ResolvedView::new(&format, &buffer);
        assert_eq!(view.resolve_range("body"), Some(range(8, 12)));

        let wide = ResolvedView::with_options(
            &format,
            &buffer,
            ResolveOptions { max_reference_width: 8 },
        );
        assert_eq!(
            wide.resolve_range("body").map(|r| r.len()),
            Some((1u64 << 48) | 4)
        );
    }

    #[test]
    fn test_rebind_clears_memo() {
        let format = build(vec![
            FieldSpec::fixed("len", 1).with_value_kind(ValueKind::Length),
            FieldSpec::variable("body").refer("len"),
        ]);
        let first = [2u8, 0, 0, 0, 0];
        let second = [4u8, 0, 0, 0, 0];

        let mut view = ResolvedView::new(&format, &first);
        assert_eq!(view.resolve_range("body"), Some(range(1, 3)));

        view.rebind(&second);
        assert_eq!(view.resolve_range("body"), Some(range(1, 5)));
    }

    #[test]
    fn test_unresolvable_predecessor_does_not_fall_back_to_zero() {
        let format = build(vec![
            FieldSpec::fixed("head", 2),
            FieldSpec::variable("blob"),
            FieldSpec::fixed("after", 2),
        ]);
        let view = ResolvedView::new(&format, &[0; 8]);

        assert_eq!(view.resolve_offset(format.lookup("blob").unwrap()), Some(2));
        assert_eq!(view.resolve_range("blob"), None);
        assert_eq!(view.resolve_range("after"), None);
    }

    #[test]
    fn test_read_out_of_bounds() {
        let format = build(vec![FieldSpec::fixed("a", 4)]);
        let view = ResolvedView::new(&format, &[1, 2]);

        assert_eq!(view.resolve_range("a"), Some(range(0, 4)));
        assert_eq!(view.field_bytes(format.lookup("a").unwrap()), None);
        assert_eq!(view.read(range(0, 2)), Some(&[1u8, 2][..]));
    }
}
