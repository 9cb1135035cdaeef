//! modplay - MOD 模块命令行工具
//!
//! 查看模块信息, 或通过与宿主相同的会话接口把模块渲染为 32 位浮点 WAV.

mod logging;
mod render;
mod wav;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use modplay_codec::ModuleInfo;
use modplay_ffi::Session;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "modplay", version, about = "纯 Rust MOD 模块播放工具")]
struct Cli {
    /// 输入模块文件路径
    #[arg(short, long)]
    input: PathBuf,

    /// 输出 WAV 文件路径 (省略时只显示信息)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 输出采样率 (Hz)
    #[arg(long, default_value_t = 48000)]
    rate: u32,

    /// 渲染时长 (秒), 默认渲染到乐曲结尾
    #[arg(short = 't', long = "duration")]
    duration: Option<f64>,

    /// 起始时间偏移 (秒)
    #[arg(long = "ss")]
    ss: Option<f64>,

    /// 每次填充的采样帧数
    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..=1_048_576))]
    block: u32,

    /// 显示模块信息
    #[arg(long)]
    info: bool,

    /// 以 JSON 格式输出模块信息
    #[arg(long)]
    json: bool,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// JSON 输出结构
#[derive(Serialize)]
struct InfoOutput<'a> {
    filename: &'a str,
    sample_rate: u32,
    duration_frames: u64,
    duration_secs: f64,
    #[serde(flatten)]
    module: ModuleInfo,
}

fn main() {
    let cli = Cli::parse();
    logging::init("modplay", cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let data = std::fs::read(&cli.input)
        .with_context(|| format!("无法读取输入文件 '{}'", cli.input.display()))?;
    let mut session = Session::create(&data, cli.rate).context("无法加载模块")?;
    info!("已加载 '{}', {} 字节", cli.input.display(), data.len());

    if cli.json {
        print_json(cli, &mut session)?;
    } else if cli.info || cli.output.is_none() {
        print_info(cli, &mut session)?;
    }

    if let Some(output) = &cli.output {
        render_output(cli, &mut session, output)?;
    }
    Ok(())
}

fn module_info(session: &Session) -> Result<ModuleInfo> {
    session.info().context("解码器未提供模块信息")
}

fn print_info(cli: &Cli, session: &mut Session) -> Result<()> {
    let module = module_info(session)?;
    let frames = session.duration()?;

    println!("输入: {}", cli.input.display());
    println!("  名称: {}", module.song_name);
    println!("  格式: {} ({} 声道)", module.format, module.channels);
    println!(
        "  序列: {} 个位置, {} 个 pattern, 重复起点 {}",
        module.sequence_length, module.patterns, module.restart_position
    );
    println!(
        "  时长: {} ({} 帧 @ {} Hz)",
        format_time(frames as f64 / f64::from(cli.rate)),
        frames,
        cli.rate
    );
    for (i, name) in module.instruments.iter().enumerate() {
        if !name.trim().is_empty() {
            println!("  乐器 {:2}: {}", i + 1, name);
        }
    }
    Ok(())
}

fn print_json(cli: &Cli, session: &mut Session) -> Result<()> {
    let frames = session.duration()?;
    let filename = cli.input.to_string_lossy();
    let output = InfoOutput {
        filename: &filename,
        sample_rate: cli.rate,
        duration_frames: frames,
        duration_secs: frames as f64 / f64::from(cli.rate),
        module: module_info(session)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn render_output(cli: &Cli, session: &mut Session, output: &Path) -> Result<()> {
    if !cli.overwrite && output.exists() {
        bail!("输出文件已存在 '{}', 使用 -y 覆盖", output.display());
    }
    let range = render::plan(session, cli.ss, cli.duration)?;
    eprintln!(
        "渲染 {} -> {} ({}, 起点 {})",
        cli.input.display(),
        output.display(),
        format_time(range.frames as f64 / f64::from(cli.rate)),
        format_time(range.start as f64 / f64::from(cli.rate)),
    );
    render::render_file(session, output, range.frames, cli.block as usize)
}

/// 秒数格式化为 mm:ss.mmm
fn format_time(secs: f64) -> String {
    let millis = (secs * 1000.0).round() as u64;
    format!("{:02}:{:02}.{:03}", millis / 60_000, millis / 1000 % 60, millis % 1000)
}
