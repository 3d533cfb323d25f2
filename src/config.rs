use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::datatypes::{DEFAULT_MAX_REFERENCE_WIDTH, MAX_SUPPORTED_WIDTH};
use crate::utils::HexMetaError;
use crate::view::ResolveOptions;

/// 查看器配置
///
/// 所有字段均可省略，省略时使用默认值：
///
/// ```json
/// { "bytesPerLine": 16, "lazyLoadSize": 4096, "maxReferenceWidth": 6 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerConfig {
    /// 每行显示的字节数
    pub bytes_per_line: usize,
    /// 每次加载的字节数（会向上取整到整行）
    pub lazy_load_size: usize,
    /// 引用值解码的最大字节宽度
    pub max_reference_width: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            bytes_per_line: 16,
            lazy_load_size: 4096,
            max_reference_width: DEFAULT_MAX_REFERENCE_WIDTH,
        }
    }
}

impl ViewerConfig {
    /// 从 JSON 文件加载并校验
    pub fn load(path: &Path) -> Result<Self, HexMetaError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HexMetaError> {
        if self.bytes_per_line == 0 {
            return Err(HexMetaError::InvalidConfig("bytesPerLine must be positive".to_string()));
        }
        if self.lazy_load_size == 0 {
            return Err(HexMetaError::InvalidConfig("lazyLoadSize must be positive".to_string()));
        }
        if !(1..=MAX_SUPPORTED_WIDTH).contains(&self.max_reference_width) {
            return Err(HexMetaError::InvalidConfig(format!(
                "maxReferenceWidth must be between 1 and {}",
                MAX_SUPPORTED_WIDTH
            )));
        }
        Ok(())
    }

    /// 每页字节数，为整行的倍数
    pub fn page_size(&self) -> usize {
        let lines = self.lazy_load_size.div_ceil(self.bytes_per_line.max(1));
        lines * self.bytes_per_line.max(1)
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            max_reference_width: self.max_reference_width,
        }
    }
}
