//! OTC 캔들 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 모의 소스로 1분봉 10개 조회
//! otc fetch --symbol EURUSD_OTC --interval 1m --limit 10 --source mock
//!
//! # 짧은 필드 이름으로 출력
//! otc fetch -s GBPUSD_OTC --style compact
//!
//! # 지원 심볼 목록
//! otc symbols
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use otc_core::{init_logging, AppConfig, CandleFieldStyle, LogConfig, LogTarget, SourceKind};
use tracing::{debug, error};

use otc_cli::commands::{render_symbols, run_fetch_now, FetchConfig, OutputFormat};

#[derive(Parser)]
#[command(name = "otc")]
#[command(about = "OTC candle CLI - 서버와 같은 설정으로 캔들을 조회합니다", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로 (기본: OTC_CONFIG 또는 config/default.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (로그는 stderr로 출력)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 캔들 조회 후 JSON 출력
    Fetch {
        /// 심볼 (예: EURUSD_OTC)
        #[arg(short, long)]
        symbol: String,

        /// 간격 (1m, 5m, 15m, 30m, 1h)
        #[arg(short, long)]
        interval: Option<String>,

        /// 캔들 개수 (최대값 초과 시 잘림)
        #[arg(short, long, allow_negative_numbers = true)]
        limit: Option<i64>,

        /// 소스 종류 덮어쓰기 (mock, proxy, time_series, browser)
        #[arg(long)]
        source: Option<SourceKind>,

        /// 필드 형태 (verbose, compact)
        #[arg(long)]
        style: Option<CandleFieldStyle>,

        /// 들여쓰기 없이 한 줄로 출력
        #[arg(long, default_value = "false")]
        compact_json: bool,
    },

    /// 지원 심볼 목록 보기
    Symbols {
        /// 출력 형식 (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(LogConfig::new(cli.log_level.clone()).with_target(LogTarget::Stderr))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load(Some(path)),
        None => AppConfig::load_default(),
    }
    .map_err(|e| {
        error!(error = %e, "설정 로드 실패");
        anyhow::anyhow!("invalid configuration: {}", e)
    })?;
    debug!(source = config.source.kind.as_str(), "Configuration loaded");

    match cli.command {
        Commands::Fetch {
            symbol,
            interval,
            limit,
            source,
            style,
            compact_json,
        } => {
            let fetch = FetchConfig {
                symbol,
                interval,
                limit,
                source,
                style,
            };
            let series = run_fetch_now(&config, &fetch).await?;
            let json = if compact_json {
                serde_json::to_string(&series)?
            } else {
                serde_json::to_string_pretty(&series)?
            };
            println!("{}", json);
        }

        Commands::Symbols { format } => {
            let format = OutputFormat::parse(&format)?;
            println!("{}", render_symbols(&config, format)?);
        }
    }

    Ok(())
}
