/// 声明式格式描述（JSON 反序列化结构）
///
/// 该结构只描述"格式长什么样"，不做任何交叉引用解析；
/// 引用在 [`FormatDescription::build`](super::FormatDescription::build) 时才连接。
use serde::{Deserialize, Serialize};

use super::{FieldKind, ValueKind};

/// 完整的格式描述文件
///
/// ```json
/// {
///   "name": "elf",
///   "label": "ELF header",
///   "fields": [
///     { "id": "e_ident", "description": "magic", "length": 16 },
///     { "id": "e_phoff", "valueKind": "offset", "length": 8 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSpec {
    /// 格式名称（如 "elf"）
    #[serde(default)]
    pub name: String,
    /// 显示名称
    #[serde(default)]
    pub label: String,
    /// 按声明顺序排列的字段
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// 单个字段的声明
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "fieldType")]
    pub kind: FieldKind,
    #[serde(default, alias = "valueType")]
    pub value_kind: ValueKind,
    /// 固定长度；缺省表示变长
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    /// 引用字段 id 列表，角色由目标字段的 valueKind 决定
    #[serde(default, alias = "referField", skip_serializing_if = "Vec::is_empty")]
    pub refer_fields: Vec<String>,
    /// 数组单条记录的内部布局
    #[serde(default, alias = "arrayEntryField", skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<EntrySpec>,
}

/// 数组条目模板的声明
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub length: Option<u64>,
}

impl FormatSpec {
    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl FieldSpec {
    /// 固定长度的普通字段
    pub fn fixed(id: impl Into<String>, length: u64) -> Self {
        Self {
            id: id.into(),
            length: Some(length),
            ..Self::default()
        }
    }

    /// 变长字段
    pub fn variable(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_value_kind(mut self, value_kind: ValueKind) -> Self {
        self.value_kind = value_kind;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn refer(mut self, target: impl Into<String>) -> Self {
        self.refer_fields.push(target.into());
        self
    }

    pub fn with_entry(mut self, id: impl Into<String>, length: u64) -> Self {
        self.entries.push(EntrySpec {
            id: id.into(),
            length: Some(length),
            ..EntrySpec::default()
        });
        self
    }
}
