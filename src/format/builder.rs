/// 格式描述构建器
///
/// 第一遍按声明顺序创建字段并确定锚点，第二遍连接引用目标。
/// 锚点选择只取决于上一个字段是定长还是变长，由 [`AnchorTracker`] 显式维护。
use std::collections::HashMap;

use super::{
    EntryTemplate, FieldDescriptor, FieldId, FieldKind, FieldSpec, FormatDescription,
    FormatSpec, MissingReference, ReferenceTargets, ValueKind,
};
use crate::utils::HexMetaError;

/// 锚点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorState {
    /// 上一个字段是定长的，当前字段可以相对轴心字段定位
    FixedRun,
    /// 上一个字段是变长的（或尚无字段），当前字段成为新的轴心
    VariablePending,
}

/// 单个字段的定位结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub base: Option<FieldId>,
    pub relative_offset: u64,
    pub is_pivot: bool,
}

/// 锚点状态机
#[derive(Debug, Clone)]
pub struct AnchorTracker {
    state: AnchorState,
    pivot: Option<FieldId>,
    accumulator: u64,
}

impl AnchorTracker {
    pub fn new() -> Self {
        Self {
            state: AnchorState::VariablePending,
            pivot: None,
            accumulator: 0,
        }
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    pub fn pivot(&self) -> Option<FieldId> {
        self.pivot
    }

    /// 定位一个字段并推进状态
    ///
    /// `absolute` 表示字段的偏移量来自引用值，它总是开启新的一段。
    pub fn place(&mut self, field: FieldId, declared_length: Option<u64>, absolute: bool) -> Placement {
        let placement = match (self.state, self.pivot) {
            (AnchorState::FixedRun, Some(pivot)) if !absolute => Placement {
                base: Some(pivot),
                relative_offset: self.accumulator,
                is_pivot: false,
            },
            _ => {
                self.pivot = Some(field);
                self.accumulator = 0;
                Placement {
                    base: None,
                    relative_offset: 0,
                    is_pivot: true,
                }
            }
        };

        match declared_length {
            Some(length) => {
                self.accumulator = self.accumulator.saturating_add(length);
                self.state = AnchorState::FixedRun;
            }
            None => {
                self.accumulator = 0;
                self.state = AnchorState::VariablePending;
            }
        }

        placement
    }
}

impl Default for AnchorTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn build(spec: &FormatSpec) -> Result<FormatDescription, HexMetaError> {
    // 预扫描 id -> valueKind，第一遍就能知道哪些字段的偏移来自引用
    let value_kinds: HashMap<&str, ValueKind> = spec
        .fields
        .iter()
        .map(|field| (field.id.as_str(), field.value_kind))
        .collect();

    let mut fields = Vec::with_capacity(spec.fields.len());
    let mut index = HashMap::with_capacity(spec.fields.len());
    let mut tracker = AnchorTracker::new();

    for (idx, field_spec) in spec.fields.iter().enumerate() {
        let id = FieldId(idx);
        if index.insert(field_spec.id.clone(), id).is_some() {
            return Err(HexMetaError::DuplicateFieldId(field_spec.id.clone()));
        }

        let absolute = field_spec
            .refer_fields
            .iter()
            .any(|target| value_kinds.get(target.as_str()) == Some(&ValueKind::Offset));

        let placement = tracker.place(id, field_spec.length, absolute);
        let previous_field = match (absolute, idx) {
            (true, _) | (_, 0) => None,
            (false, _) => Some(FieldId(idx - 1)),
        };

        fields.push(FieldDescriptor {
            id: field_spec.id.clone(),
            label: field_spec.label.clone(),
            description: field_spec.description.clone(),
            kind: field_spec.kind,
            value_kind: field_spec.value_kind,
            declared_length: field_spec.length,
            relative_offset: placement.relative_offset,
            base_offset_field: placement.base,
            previous_field,
            reference_targets: ReferenceTargets::default(),
            entry_templates: build_entry_templates(field_spec)?,
        });
    }

    let missing_references = wire_references(&spec.fields, &mut fields, &index);

    Ok(FormatDescription {
        name: spec.name.clone(),
        label: spec.label.clone(),
        fields,
        index,
        missing_references,
    })
}

/// 条目模板的相对偏移为前面所有模板长度之和
fn build_entry_templates(field_spec: &FieldSpec) -> Result<Vec<EntryTemplate>, HexMetaError> {
    if field_spec.kind != FieldKind::Array {
        return Ok(Vec::new());
    }

    let mut relative_offset = 0u64;
    field_spec
        .entries
        .iter()
        .map(|entry| {
            let length = entry.length.ok_or_else(|| HexMetaError::VariableLengthEntry {
                array: field_spec.id.clone(),
                entry: entry.id.clone(),
            })?;
            let template = EntryTemplate {
                id: entry.id.clone(),
                label: entry.label.clone(),
                description: entry.description.clone(),
                relative_offset,
                length,
            };
            relative_offset = relative_offset.saturating_add(length);
            Ok(template)
        })
        .collect()
}

/// 第二遍：按目标字段的 valueKind 记录引用，找不到的目标只记录不报错
fn wire_references(
    specs: &[FieldSpec],
    fields: &mut [FieldDescriptor],
    index: &HashMap<String, FieldId>,
) -> Vec<MissingReference> {
    let mut missing = Vec::new();

    for (idx, field_spec) in specs.iter().enumerate() {
        for target_id in &field_spec.refer_fields {
            let Some(&target) = index.get(target_id) else {
                #[cfg(debug_assertions)]
                eprintln!("⚠️  字段 {} 引用了不存在的字段 {}", field_spec.id, target_id);
                missing.push(MissingReference {
                    field: field_spec.id.clone(),
                    target: target_id.clone(),
                });
                continue;
            };

            if let Some(role) = fields[target.0].value_kind.role() {
                fields[idx].reference_targets.set(role, target);
            }
        }
    }

    missing
}
