use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use hexmeta::io::{
    BinaryReader, DefaultBinaryReader, DefaultBinaryWriter, FormatSpecReader, JsonFormatSpecReader,
    MappedBinaryReader,
};
use hexmeta::utils::{create_backup, parse_offset};
use hexmeta::{
    annotate, BinaryEditor, FieldDumper, FormatDescription, HexDumper, OverlaySnapshot, SourceRange,
    ViewerConfig,
};

#[derive(Parser)]
#[command(name = "hexmeta")]
#[command(about = "按格式描述注解、查看并编辑二进制文件")]
#[command(version = "0.1.0")]
struct Cli {
    /// 输入二进制文件路径
    #[arg(short, long)]
    input: PathBuf,

    /// 格式描述 JSON 文件路径
    #[arg(short, long)]
    format: Option<PathBuf>,

    /// 查看器配置 JSON 文件路径
    #[arg(long)]
    config: Option<PathBuf>,

    /// 以十六进制转储显示文件内容
    #[arg(long)]
    dump: bool,

    /// 转储起始偏移(十进制或 0x 开头的十六进制)
    #[arg(long)]
    start: Option<String>,

    /// 转储长度，默认一页
    #[arg(long)]
    length: Option<String>,

    /// 列出格式描述中每个字段的区间
    #[arg(long, requires = "format")]
    fields: bool,

    /// 字段结构写入文件而不是标准输出
    #[arg(long, requires = "format")]
    fields_output: Option<PathBuf>,

    /// 改写一个字节，格式 OFFSET=HH，可重复
    #[arg(long = "set", value_name = "OFFSET=HH")]
    set: Vec<String>,

    /// 删除一个字节，可重复
    #[arg(long = "delete", value_name = "OFFSET")]
    delete: Vec<String>,

    /// 从快照文件恢复编辑
    #[arg(long)]
    restore: Option<PathBuf>,

    /// 把待保存的编辑写入快照文件（该次运行不保存文件）
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// 输出文件路径，默认为 <文件名>_edited.<扩展名>
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 直接覆盖输入文件
    #[arg(long, conflicts_with = "output")]
    in_place: bool,

    /// 覆盖输入文件前创建备份
    #[arg(long, requires = "in_place")]
    backup: bool,

    /// 使用内存映射读取输入文件
    #[arg(long)]
    mmap: bool,

    /// 静默模式(仅输出错误)
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    run(&Cli::parse())
}

fn run(cli: &Cli) -> Result<()> {
    validate_input(&cli.input)?;

    let config = load_config(cli)?;
    let mut editor = open_editor(cli)?;

    if let Some(restore_path) = &cli.restore {
        restore_edits(cli, &mut editor, restore_path)?;
    }
    apply_edits(cli, &mut editor)?;

    if cli.dump {
        print_dump(cli, &config, &editor)?;
    }

    if let Some(format_path) = &cli.format {
        handle_format(cli, &config, &editor, format_path)?;
    }

    if let Some(snapshot_path) = &cli.snapshot {
        write_snapshot(cli, &editor, snapshot_path)?;
    }

    match get_save_path(cli) {
        Some(output_path) if editor.is_modified() => save_edits(cli, &mut editor, &output_path)?,
        _ => {
            if !cli.quiet && !cli.dump && !cli.fields {
                println!("{}", editor.summary());
            }
        }
    }

    Ok(())
}

/// 验证输入文件
fn validate_input(input: &Path) -> Result<()> {
    if !input.exists() {
        bail!("输入文件不存在: {:?}", input);
    }
    if !input.is_file() {
        bail!("输入路径不是文件: {:?}", input);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ViewerConfig> {
    match &cli.config {
        Some(path) => ViewerConfig::load(path).with_context(|| format!("读取配置失败: {:?}", path)),
        None => Ok(ViewerConfig::default()),
    }
}

fn open_editor(cli: &Cli) -> Result<BinaryEditor> {
    let reader: &dyn BinaryReader = if cli.mmap { &MappedBinaryReader } else { &DefaultBinaryReader };
    let editor = BinaryEditor::open(reader, &cli.input).with_context(|| format!("读取文件失败: {:?}", cli.input))?;

    if !cli.quiet {
        println!("已加载 {:?} ({} bytes)", cli.input, editor.len());
    }
    Ok(editor)
}

fn parse_offset_arg(text: &str) -> Result<u64> {
    parse_offset(text).ok_or_else(|| anyhow!("无效的偏移: {}", text))
}

/// 从快照文件恢复编辑
fn restore_edits(cli: &Cli, editor: &mut BinaryEditor, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path).with_context(|| format!("读取快照失败: {:?}", path))?;
    let snapshot: OverlaySnapshot = serde_json::from_str(&json).with_context(|| format!("解析快照失败: {:?}", path))?;
    editor.restore_overlay(&snapshot)?;

    if !cli.quiet {
        println!("已恢复 {} 处编辑", editor.modified_count());
    }
    Ok(())
}

/// 应用命令行中的改写和删除
fn apply_edits(cli: &Cli, editor: &mut BinaryEditor) -> Result<()> {
    for edit in &cli.set {
        let (offset, value) = edit
            .split_once('=')
            .ok_or_else(|| anyhow!("改写参数格式应为 OFFSET=HH: {}", edit))?;
        let offset = parse_offset_arg(offset)?;
        editor
            .record_overwrite(offset, value)
            .with_context(|| format!("改写失败: {}", edit))?;
    }

    for offset in &cli.delete {
        let offset = parse_offset_arg(offset)?;
        editor.record_delete(offset).with_context(|| format!("删除失败: 0x{:X}", offset))?;
    }

    if !cli.quiet && (!cli.set.is_empty() || !cli.delete.is_empty()) {
        println!("记录了 {} 处改写, {} 处删除", cli.set.len(), cli.delete.len());
    }
    Ok(())
}

fn print_dump(cli: &Cli, config: &ViewerConfig, editor: &BinaryEditor) -> Result<()> {
    let start = match &cli.start {
        Some(text) => parse_offset_arg(text)?,
        None => 0,
    };
    let length = match &cli.length {
        Some(text) => parse_offset_arg(text)?,
        None => config.page_size() as u64,
    };
    let range = SourceRange::from_len(start, length).ok_or_else(|| anyhow!("转储区间溢出: {} + {}", start, length))?;

    let dumper = HexDumper::from_config(config);
    let overlay = editor.is_modified().then(|| editor.overlay());
    println!("{}", dumper.render(editor.bytes(), range, overlay));
    Ok(())
}

/// 加载格式描述并输出字段信息
fn handle_format(cli: &Cli, config: &ViewerConfig, editor: &BinaryEditor, format_path: &Path) -> Result<()> {
    let spec = JsonFormatSpecReader
        .read(format_path)
        .with_context(|| format!("读取格式描述失败: {:?}", format_path))?;
    let format = FormatDescription::build(&spec)?;

    if !cli.quiet {
        println!("格式 {} 包含 {} 个字段", format.name(), format.len());
        for missing in format.missing_references() {
            eprintln!("警告: 字段 {} 引用的 {} 不存在", missing.field, missing.target);
        }
    }

    let view = editor.view(&format, config.resolve_options());

    if let Some(output_path) = &cli.fields_output {
        FieldDumper::dump_to_file(&view, output_path)?;
        if !cli.quiet {
            println!("字段结构已写入: {:?}", output_path);
        }
    } else if cli.fields {
        let annotations = annotate(&view);
        for annotation in &annotations {
            let name = match &annotation.entry {
                Some(entry) => format!(
                    "{}[{}].{}",
                    annotation.field_id,
                    entry.index,
                    entry.template.as_deref().unwrap_or("*")
                ),
                None => annotation.field_id.clone(),
            };
            println!("{} {:<24} {} {}", annotation.range, name, annotation.hex, annotation.description);
        }
        if !cli.quiet {
            println!("共解析 {} 个区间", annotations.len());
        }
    }

    Ok(())
}

fn write_snapshot(cli: &Cli, editor: &BinaryEditor, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&editor.snapshot_overlay())?;
    std::fs::write(path, json).with_context(|| format!("写入快照失败: {:?}", path))?;

    if !cli.quiet {
        println!("快照已写入: {:?}", path);
    }
    Ok(())
}

/// 获取保存路径
///
/// 显式给出 `--output` 或 `--in-place` 时总是保存；否则只有命令行上的改写/删除
/// 才保存到派生路径。写快照和仅恢复快照的运行不保存文件。
fn get_save_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(output) = &cli.output {
        return Some(output.clone());
    }
    if cli.in_place {
        return Some(cli.input.clone());
    }
    if cli.snapshot.is_some() || (cli.set.is_empty() && cli.delete.is_empty()) {
        return None;
    }
    Some(get_edited_output_path(&cli.input))
}

/// 默认输出路径: <文件名>_edited.<扩展名>
fn get_edited_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(extension) => format!("{}_edited.{}", stem, extension.to_string_lossy()),
        None => format!("{}_edited", stem),
    };
    input.with_file_name(file_name)
}

/// 保存编辑，覆盖原文件时可先备份
fn save_edits(cli: &Cli, editor: &mut BinaryEditor, output_path: &Path) -> Result<()> {
    if cli.in_place && cli.backup {
        let backup_path = create_backup(&cli.input)?;
        if !cli.quiet {
            println!("已备份到: {:?}", backup_path);
        }
    }

    editor
        .save(&DefaultBinaryWriter, output_path)
        .with_context(|| format!("保存失败: {:?}", output_path))?;

    if !cli.quiet {
        println!("{}", editor.summary());
        println!("已保存到: {:?}", output_path);
    }
    Ok(())
}
