// Entry point and interactive menu.
//
// - `--mode` runs one mode and exits.
// - Without it, the numbered menu asks for a mode; after a run the user can
//   go back to the menu or exit.
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use provincial_summary::output::preview_workbook;
use provincial_summary::process::run_mode;
use provincial_summary::{logging, Config, RunMode};

#[derive(Parser, Debug)]
#[command(name = "provincial_summary", about = "GPT delay reports and provincial summary")]
struct Args {
    /// JSON configuration file.
    #[arg(long, default_value = "config/config.json")]
    config: PathBuf,

    /// Run one mode (1-4) without the menu.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<RunMode>,
}

fn parse_mode(s: &str) -> std::result::Result<RunMode, String> {
    s.parse().map_err(|e: provincial_summary::ReportError| e.to_string())
}

/// Read a single line of input after printing `prompt`; `None` once stdin
/// is closed.
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask whether to go back to the menu after a run.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(resp) = read_line("返回功能菜单 (Y/N): ") else {
            return false;
        };
        match resp.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("请输入 Y 或 N。"),
        }
    }
}

fn print_menu() {
    println!("请输入你要进入的功能模块");
    for mode in [
        RunMode::DailyGpt,
        RunMode::PeriodGpt,
        RunMode::ProvincialSummary,
        RunMode::Exit,
    ] {
        println!("\t{mode}");
    }
}

/// Run one mode and show what it produced. Failures are reported, not fatal,
/// so the menu can carry on.
fn handle_mode(mode: RunMode, config: &Config) -> bool {
    match run_mode(mode, config) {
        Ok(summary) => {
            preview_workbook(&summary.workbook, config.output.preview_rows);
            for path in &summary.written {
                println!("(已导出 {})", path.display());
            }
            if let Some(stats) = &summary.stats {
                println!(
                    "省区行数 {}, 新-环节填充 {}, 复盘-环节填充 {}, 消除 {}, 多环节标签 {}\n",
                    stats.reconciliation.provincial_rows,
                    stats.reconciliation.verified_filled,
                    stats.reconciliation.review_filled,
                    stats.reconciliation.review_resolved,
                    stats.reconciliation.ambiguous_labels.len()
                );
            }
            true
        }
        Err(e) => {
            error!("{mode} failed: {e}");
            eprintln!("运行失败: {e}\n");
            false
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_json(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    logging::init(&config.log).context("initialising logging")?;
    info!("{}", "-".repeat(50));
    info!("program started");

    if let Some(mode) = args.mode {
        if mode != RunMode::Exit && !handle_mode(mode, &config) {
            anyhow::bail!("{mode} failed");
        }
        info!("program finished");
        return Ok(());
    }

    loop {
        print_menu();
        let Some(choice) = read_line("请输入数字(1或2或3或4): ") else {
            break;
        };
        let mode = match choice.parse::<RunMode>() {
            Ok(mode) => mode,
            Err(e) => {
                info!("invalid menu choice: {e}");
                println!("输入的功能模块编号不正确请重新输入！\n");
                continue;
            }
        };
        if mode == RunMode::Exit {
            break;
        }
        println!();
        handle_mode(mode, &config);
        if !prompt_back_to_menu() {
            break;
        }
    }
    info!("program finished");
    info!("{}", "-".repeat(50));
    Ok(())
}
