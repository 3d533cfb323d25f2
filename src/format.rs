/// 格式描述模块
///
/// 把声明式的字段列表（[`FormatSpec`]）构建为带交叉引用的字段图。
/// 字段保存在一个按声明顺序排列的数组中，所有引用都是数组下标（[`FieldId`]），
/// 不持有其他字段的所有权，因此允许前向引用和缺失引用。
///
/// - **spec**: JSON 反序列化结构
/// - **builder**: 两遍构建（锚点状态机 + 引用连接）
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::HexMetaError;

pub mod builder;
pub mod spec;

pub use builder::{AnchorState, AnchorTracker, Placement};
pub use spec::{EntrySpec, FieldSpec, FormatSpec};

/// 字段形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    #[default]
    Plain,
    Reference,
    Array,
}

/// 字段解码值对其他字段所起的作用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    #[default]
    Plain,
    Length,
    Offset,
    ArrayElementSize,
    ArrayElementCount,
    Termination,
}

/// 引用角色：被引用字段的值用于哪一项几何信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceRole {
    Offset,
    Length,
    ArrayElementSize,
    ArrayElementCount,
}

impl ValueKind {
    /// `Plain` 和 `Termination` 不承担引用角色
    pub fn role(self) -> Option<ReferenceRole> {
        match self {
            ValueKind::Offset => Some(ReferenceRole::Offset),
            ValueKind::Length => Some(ReferenceRole::Length),
            ValueKind::ArrayElementSize => Some(ReferenceRole::ArrayElementSize),
            ValueKind::ArrayElementCount => Some(ReferenceRole::ArrayElementCount),
            ValueKind::Plain | ValueKind::Termination => None,
        }
    }
}

/// 字段在 [`FormatDescription`] 中的稳定下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) usize);

impl FieldId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 每个角色最多一个引用目标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceTargets {
    pub offset: Option<FieldId>,
    pub length: Option<FieldId>,
    pub element_size: Option<FieldId>,
    pub element_count: Option<FieldId>,
}

impl ReferenceTargets {
    pub fn get(&self, role: ReferenceRole) -> Option<FieldId> {
        match role {
            ReferenceRole::Offset => self.offset,
            ReferenceRole::Length => self.length,
            ReferenceRole::ArrayElementSize => self.element_size,
            ReferenceRole::ArrayElementCount => self.element_count,
        }
    }

    pub(crate) fn set(&mut self, role: ReferenceRole, target: FieldId) {
        let slot = match role {
            ReferenceRole::Offset => &mut self.offset,
            ReferenceRole::Length => &mut self.length,
            ReferenceRole::ArrayElementSize => &mut self.element_size,
            ReferenceRole::ArrayElementCount => &mut self.element_count,
        };
        *slot = Some(target);
    }
}

/// 数组单条记录内的子字段模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTemplate {
    pub id: String,
    pub label: String,
    pub description: String,
    /// 记录内的相对偏移
    pub relative_offset: u64,
    pub length: u64,
}

/// 已构建的字段描述符
///
/// 构建完成后只读；解析出的偏移、长度由 [`ResolvedView`](crate::view::ResolvedView) 缓存。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) description: String,
    pub(crate) kind: FieldKind,
    pub(crate) value_kind: ValueKind,
    pub(crate) declared_length: Option<u64>,
    pub(crate) relative_offset: u64,
    pub(crate) base_offset_field: Option<FieldId>,
    pub(crate) previous_field: Option<FieldId>,
    pub(crate) reference_targets: ReferenceTargets,
    pub(crate) entry_templates: Vec<EntryTemplate>,
}

impl FieldDescriptor {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn declared_length(&self) -> Option<u64> {
        self.declared_length
    }

    pub fn relative_offset(&self) -> u64 {
        self.relative_offset
    }

    pub fn base_offset_field(&self) -> Option<FieldId> {
        self.base_offset_field
    }

    pub fn previous_field(&self) -> Option<FieldId> {
        self.previous_field
    }

    pub fn reference_targets(&self) -> &ReferenceTargets {
        &self.reference_targets
    }

    pub fn entry_templates(&self) -> &[EntryTemplate] {
        &self.entry_templates
    }

    pub fn is_array(&self) -> bool {
        self.kind == FieldKind::Array
    }

    /// 描述文本为空时退回到标签，再退回到 id
    pub fn display_name(&self) -> &str {
        [&self.description, &self.label]
            .into_iter()
            .find(|text| !text.is_empty())
            .unwrap_or(&self.id)
    }
}

/// 构建时无法解析的引用（非致命）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingReference {
    /// 声明引用的字段
    pub field: String,
    /// 找不到的目标 id
    pub target: String,
}

/// 一个格式的完整字段图
#[derive(Debug, Clone)]
pub struct FormatDescription {
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) index: HashMap<String, FieldId>,
    pub(crate) missing_references: Vec<MissingReference>,
}

impl FormatDescription {
    /// 从声明式描述构建字段图（不读取任何二进制数据）
    pub fn build(spec: &FormatSpec) -> Result<Self, HexMetaError> {
        builder::build(spec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 按 id 查找字段下标
    pub fn lookup(&self, id: &str) -> Option<FieldId> {
        self.index.get(id).copied()
    }

    /// 按下标取字段
    ///
    /// # Panics
    /// `id` 不属于这个格式描述时 panic；来源不确定的下标请用 [`Self::get`]。
    pub fn field(&self, id: FieldId) -> &FieldDescriptor {
        &self.fields[id.0]
    }

    pub fn get(&self, id: FieldId) -> Option<&FieldDescriptor> {
        self.fields.get(id.0)
    }

    pub fn field_by_id(&self, id: &str) -> Option<&FieldDescriptor> {
        self.lookup(id).and_then(|field_id| self.get(field_id))
    }

    /// 按声明顺序遍历字段
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (FieldId(idx), field))
    }

    /// 构建时被忽略的缺失引用
    pub fn missing_references(&self) -> &[MissingReference] {
        &self.missing_references
    }
}
