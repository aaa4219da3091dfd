//! vocabweave 命令行入口

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::Parser;

use vocabweave::env::{core::LogLevel, EnvVar};
use vocabweave::html::{get_body, get_charset, html_to_dom, serialize_document};
use vocabweave::translation::core::restore_all;
use vocabweave::translation::pipeline::{NoLayout, SegmentOptions};
use vocabweave::translation::{load_config, open_storage, PageSession, TranslationResult};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 输入 HTML 文件，`-` 表示标准输入
    input: String,

    /// 输出文件，默认写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 配置文件路径（TOML 或 JSON）
    #[arg(short, long)]
    config: Option<String>,

    /// 缓存数据库路径（redb）
    #[arg(long)]
    cache_db: Option<String>,

    /// 不访问任何远程服务，只使用本地缓存
    #[arg(long)]
    offline: bool,

    /// 还原已替换的单词而不是进行替换
    #[arg(long)]
    restore: bool,
}

fn init_logging() {
    let level = LogLevel::get_or_default("info".to_string())
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(input: &str) -> TranslationResult<Vec<u8>> {
    if input == "-" {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        Ok(data)
    } else {
        Ok(std::fs::read(input)?)
    }
}

async fn run(args: Args) -> TranslationResult<()> {
    let config = load_config(args.config.as_deref())?;
    let db_path = args.cache_db.clone().or_else(|| config.cache_db_path.clone());
    let options = SegmentOptions::from_config(&config);

    let data = read_input(&args.input)?;
    let mut dom = html_to_dom(&data, "utf-8");
    let encoding = get_charset(&dom.document).unwrap_or_else(|| "utf-8".to_string());
    if !encoding.eq_ignore_ascii_case("utf-8") {
        tracing::debug!("按声明的字符集重新解析: {}", encoding);
        dom = html_to_dom(&data, &encoding);
    }
    let root = get_body(&dom).unwrap_or_else(|| dom.document.clone());

    if args.restore {
        let restored = restore_all(&root);
        tracing::info!("已还原 {} 个单词", restored);
    } else {
        let storage = open_storage(db_path.as_deref())?;
        let session = PageSession::from_config(config, &storage, args.offline)?;
        let report = session.process_page(&root, &NoLayout, options).await?;
        session.flush().await;

        let totals = session.service().stats().session_totals();
        tracing::info!(
            "共 {} 个段落，替换 {} 个单词（缓存命中批次 {}，远程请求 {}）",
            report.segments,
            report.total_words(),
            totals.cache_hits,
            totals.cache_misses
        );
    }
    drop(root);

    let output = serialize_document(dom, &encoding)?;
    match &args.output {
        Some(path) => std::fs::write(path, output)?,
        None => std::io::stdout().write_all(&output)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging();

    if let Err(e) = run(args).await {
        eprintln!("错误: {}", e);
        std::process::exit(1);
    }
}
