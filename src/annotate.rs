use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::format::{EntryTemplate, FieldId};
use crate::range::SourceRange;
use crate::utils::HexMetaError;
use crate::view::ResolvedView;

/// 数组元素内的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPosition {
    /// 元素下标
    pub index: u64,
    /// 条目模板 id；没有模板时为 None（整个元素槽位）
    pub template: Option<String>,
}

/// 一条字段注解
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAnnotation {
    pub field_id: String,
    pub description: String,
    pub entry: Option<EntryPosition>,
    pub range: SourceRange,
    /// 区间内字节的小写十六进制
    pub hex: String,
}

/// 按声明顺序列出所有可解析字段的区间
///
/// 数组按元素逐个展开；无法解析或超出缓冲区的字段被跳过。
pub fn annotate(view: &ResolvedView<'_>) -> Vec<FieldAnnotation> {
    let mut annotations = Vec::new();

    for (id, field) in view.format().iter() {
        if field.is_array() {
            annotate_array(view, id, &mut annotations);
            continue;
        }

        let Some(range) = view.raw_range(id) else {
            continue;
        };
        if let Some(bytes) = view.read(range) {
            annotations.push(FieldAnnotation {
                field_id: field.id().to_string(),
                description: field.display_name().to_string(),
                entry: None,
                range,
                hex: to_hex(bytes),
            });
        }
    }

    annotations
}

fn annotate_array(view: &ResolvedView<'_>, id: FieldId, annotations: &mut Vec<FieldAnnotation>) {
    let field = view.format().field(id);
    let Some(count) = view.resolve_element_count(id) else {
        return;
    };

    for index in 0..count {
        let Some(ranges) = view.entry_ranges(id, index) else {
            break;
        };
        // 元素连续排列，一旦越界后面的也都越界
        if ranges.iter().any(|range| view.read(*range).is_none()) {
            break;
        }

        let templates = field.entry_templates();
        for (slot, range) in ranges.into_iter().enumerate() {
            let template = templates.get(slot);
            annotations.push(FieldAnnotation {
                field_id: field.id().to_string(),
                description: template
                    .map(template_name)
                    .unwrap_or_else(|| field.display_name().to_string()),
                entry: Some(EntryPosition {
                    index,
                    template: template.map(|t| t.id.clone()),
                }),
                range,
                hex: view.read(range).map(to_hex).unwrap_or_default(),
            });
        }
    }
}

fn template_name(template: &EntryTemplate) -> String {
    [&template.description, &template.label]
        .into_iter()
        .find(|text| !text.is_empty())
        .unwrap_or(&template.id)
        .clone()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// 字段结构转储器
pub struct FieldDumper;

impl FieldDumper {
    /// 生成字段结构 dump 并写入文件
    pub fn dump_to_file(view: &ResolvedView<'_>, output_path: &Path) -> Result<(), HexMetaError> {
        let mut output = File::create(output_path)?;
        Self::dump(view, &mut output)
    }

    /// 写入字段结构：`起始 || 结束 || 十六进制 || 描述`
    pub fn dump(view: &ResolvedView<'_>, output: &mut dyn Write) -> Result<(), HexMetaError> {
        let format = view.format();
        writeln!(output, "=== 格式: {} ===", if format.label().is_empty() { format.name() } else { format.label() })?;

        let mut last_entry: Option<(String, u64)> = None;
        for annotation in annotate(view) {
            match &annotation.entry {
                Some(entry) => {
                    let key = (annotation.field_id.clone(), entry.index);
                    if last_entry.as_ref().is_some_and(|last| *last != key) {
                        writeln!(output, "======")?;
                    }
                    last_entry = Some(key);
                    writeln!(
                        output,
                        ">>> {} || {} || {} || {}",
                        annotation.range.start(),
                        annotation.range.end(),
                        annotation.hex,
                        annotation.description
                    )?;
                }
                None => {
                    if last_entry.take().is_some() {
                        writeln!(output, "======")?;
                    }
                    writeln!(
                        output,
                        "{} || {} || {} || {}",
                        annotation.range.start(),
                        annotation.range.end(),
                        annotation.hex,
                        annotation.description
                    )?;
                }
            }
        }
        if last_entry.is_some() {
            writeln!(output, "======")?;
        }

        for missing in format.missing_references() {
            writeln!(output, "⚠️  {} -> {} (未找到引用目标)", missing.field, missing.target)?;
        }

        Ok(())
    }
}
