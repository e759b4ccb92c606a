use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use reference_refinement::config::{Config, SelectionMode};
use reference_refinement::infrastructure::DecisionsStore;
use reference_refinement::orchestrator::{commands, App};
use reference_refinement::utils::logging;

#[derive(Parser)]
#[command(name = "refine")]
#[command(about = "为 decisions.txt 中的文献记录查找并校验链接")]
struct Cli {
    /// 配置文件（默认读取当前目录下的 refine.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// decisions 文件路径
    #[arg(long, global = true, env = "DECISIONS_FILE")]
    file: Option<PathBuf>,

    /// 输出 debug 日志
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 批量处理选中的记录
    Run {
        /// 跳过检查点中已完成的记录
        #[arg(long, default_value_t = false)]
        resume: bool,
        #[arg(long, value_enum)]
        mode: Option<SelectionMode>,
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        end: Option<u32>,
        #[arg(long)]
        limit: Option<usize>,
        /// 满足条件时自动标记 FINALIZED
        #[arg(long, default_value_t = false)]
        auto_finalize: bool,
        /// 为处理过的记录加上批次标记，例如 BATCH_v20.0
        #[arg(long)]
        batch_flag: Option<String>,
    },
    /// 统计文件状态
    Stats,
    /// 检查解析问题
    Check,
    /// 将一条记录标记为终稿
    Finalize { id: u32 },
    /// 导出终稿记录的干净版本
    ExportClean {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(file) = &cli.file {
        config.decisions_file = file.display().to_string();
    }
    if cli.verbose {
        config.verbose_logging = true;
    }

    // 初始化日志
    logging::init(config.verbose_logging);

    let result = dispatch(cli.command, config).await;
    if let Err(e) = &result {
        error!("❌ {:#}", e);
    }
    result
}

async fn dispatch(command: Command, mut config: Config) -> Result<()> {
    match command {
        Command::Run {
            resume,
            mode,
            start,
            end,
            limit,
            auto_finalize,
            batch_flag,
        } => {
            if let Some(mode) = mode {
                config.selection_mode = mode;
            }
            if start.is_some() || end.is_some() {
                config.range_start = start.or(config.range_start);
                config.range_end = end.or(config.range_end);
                if mode.is_none() {
                    config.selection_mode = SelectionMode::Range;
                }
            }
            config.limit = limit.or(config.limit);
            config.auto_finalize |= auto_finalize;
            if batch_flag.is_some() {
                config.batch_flag = batch_flag;
            }

            let app = App::initialize(config).context("初始化失败")?;
            app.watch_ctrl_c();
            let summary = app.run(resume).await?;
            if summary.interrupted {
                warn!("⏹️ 运行被中断，可使用 run --resume 继续");
            }
            Ok(())
        }
        Command::Stats => {
            config.validate(false)?;
            commands::stats(&store_for(&config))?;
            Ok(())
        }
        Command::Check => {
            config.validate(false)?;
            commands::check(&store_for(&config))?;
            Ok(())
        }
        Command::Finalize { id } => {
            config.validate(false)?;
            commands::finalize(&store_for(&config), id)?;
            Ok(())
        }
        Command::ExportClean { output } => {
            config.validate(false)?;
            let output = output.unwrap_or_else(|| PathBuf::from(&config.clean_output_file));
            commands::export_clean(&store_for(&config), &output)?;
            Ok(())
        }
    }
}

fn store_for(config: &Config) -> DecisionsStore {
    DecisionsStore::new(
        &config.decisions_file,
        &config.backup_dir,
        config.parse_options(),
    )
}
