/// IO 抽象层模块
///
/// 该模块提供了文件读写的抽象接口，遵循依赖倒置原则。
/// 支持依赖注入、测试 mock 和替换 IO 实现（如内存映射、内存 IO 等）。
///
/// # 架构设计
///
/// - **traits**: 定义 Reader/Writer trait 接口
/// - **binary_io**: 二进制文件的默认实现
/// - **format_io**: JSON 格式描述的默认实现
///
/// # 使用示例
///
/// ```rust,ignore
/// use hexmeta::io::{BinaryReader, DefaultBinaryReader};
///
/// let buffer = DefaultBinaryReader.read(Path::new("a.out"))?;
/// ```
pub mod binary_io;
pub mod format_io;
pub mod traits;

// === 导出 trait 定义 ===
pub use traits::{BinaryReader, BinaryWriter, FormatSpecReader};

// === 导出默认实现 ===
pub use binary_io::{DefaultBinaryReader, DefaultBinaryWriter, MappedBinaryReader};
pub use format_io::JsonFormatSpecReader;
