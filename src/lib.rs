pub mod annotate;
pub mod buffer;
pub mod config;
pub mod datatypes;
pub mod editor;
pub mod format;
pub mod hexdump;
pub mod io;
pub mod range;
pub mod utils;
pub mod view;

// 重新导出主要结构
pub use annotate::{annotate, FieldAnnotation, FieldDumper};
pub use buffer::BinaryBuffer;
pub use config::ViewerConfig;
pub use editor::{BinaryEditor, ByteEdit, EditOverlay, OverlaySnapshot, Reconstructor};
pub use format::{FieldId, FieldKind, FieldSpec, FormatDescription, FormatSpec, ValueKind};
pub use hexdump::{HexDumper, PageCursor};
pub use range::SourceRange;
pub use utils::{parse_hex_byte, HexMetaError, InvalidByteText};
pub use view::{ResolveOptions, ResolvedView};

// 常量定义
pub const FORMAT_SPEC_EXTENSION: &str = "json";
