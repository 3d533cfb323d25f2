/// 格式描述文件 IO 实现
use std::path::Path;

use super::traits::FormatSpecReader;
use crate::format::FormatSpec;
use crate::utils::HexMetaError;

/// JSON 格式描述读取器
#[derive(Debug, Clone, Default)]
pub struct JsonFormatSpecReader;

impl JsonFormatSpecReader {
    /// 在资源目录中按格式名查找 `<name>.json`
    pub fn read_named(&self, dir: &Path, format_name: &str) -> Result<FormatSpec, HexMetaError> {
        self.read(&dir.join(format!("{}.{}", format_name, crate::FORMAT_SPEC_EXTENSION)))
    }
}

impl FormatSpecReader for JsonFormatSpecReader {
    fn read(&self, path: &Path) -> Result<FormatSpec, HexMetaError> {
        let json = std::fs::read_to_string(path)?;
        let mut spec = FormatSpec::from_json(&json)?;

        // 文件里没写名称时使用文件名
        if spec.name.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                spec.name = stem.to_string();
            }
        }

        Ok(spec)
    }
}
