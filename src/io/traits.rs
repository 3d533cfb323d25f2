/// IO 抽象层 - trait 定义
///
/// 该模块定义了文件读写的抽象接口，支持依赖注入和测试 mock。
/// 解析与重建逻辑只面向这些接口，不直接访问文件系统。

use std::path::Path;

use crate::buffer::BinaryBuffer;
use crate::format::FormatSpec;
use crate::utils::HexMetaError;

/// 二进制文件读取 trait
///
/// # 职责
/// - 把整个文件读入（或映射到）内存
/// - 不负责解析，仅负责 IO
pub trait BinaryReader {
    /// 读取文件内容
    ///
    /// # 参数
    /// * `path` - 文件路径
    fn read(&self, path: &Path) -> Result<BinaryBuffer, HexMetaError>;
}

/// 二进制文件写入 trait
///
/// # 职责
/// - 将重建后的字节写入文件系统
pub trait BinaryWriter {
    /// 写入数据
    ///
    /// # 参数
    /// * `data` - 要写入的字节
    /// * `path` - 目标文件路径
    fn write(&self, data: &[u8], path: &Path) -> Result<(), HexMetaError>;
}

/// 格式描述读取 trait
///
/// # 职责
/// - 读取并反序列化格式描述文件，得到 [`FormatSpec`]
pub trait FormatSpecReader {
    fn read(&self, path: &Path) -> Result<FormatSpec, HexMetaError>;
}
