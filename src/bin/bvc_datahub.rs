use bvc_datahub::config::Config;
use bvc_datahub::data_provider::SnapshotStore;
use bvc_datahub::logger;
use bvc_datahub::models::stock::StockSummaryRecord;
use bvc_datahub::services::api;
use bvc_datahub::services::data_service::DataService;
use bvc_datahub::services::scheduler::{DailySchedule, Orchestrator};
use bvc_datahub::session::{StaticPageOpener, WebDriverOpener};

use anyhow::Context;
use clap::{App, Arg, ArgMatches, SubCommand};
use log::{error, info, warn};
use std::time::Duration;

fn browser_args<'a>(cmd: App<'a>) -> App<'a> {
    cmd.arg(
        Arg::with_name("url")
            .long("url")
            .value_name("URL")
            .help("Market summary page to scrape")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("webdriver")
            .long("webdriver")
            .value_name("URL")
            .help("WebDriver (chromedriver) endpoint")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("timeout-ms")
            .long("timeout-ms")
            .value_name("MS")
            .help("How long to wait for each detail panel")
            .takes_value(true)
            .default_value("10000"),
    )
}

/// 全局参数：数据目录与日志文件
fn base_config(matches: &ArgMatches) -> Config {
    Config::new()
        .with_data_dir(matches.value_of("data-dir").unwrap_or("json"))
        .with_log_file(matches.value_of("log-file"))
}

/// 在全局配置上叠加浏览器相关参数
fn build_config(mut config: Config, matches: &ArgMatches, sub: &ArgMatches) -> anyhow::Result<Config> {
    if let Some(url) = sub.value_of("url") {
        config = config.with_target_url(url);
    }
    if let Some(url) = sub.value_of("webdriver") {
        config = config.with_webdriver_url(url);
    }
    if let Some(ms) = sub.value_of("timeout-ms") {
        let ms = ms.parse::<u64>().context("--timeout-ms must be a number")?;
        config = config.with_wait_timeout(Duration::from_millis(ms));
    }

    #[cfg(debug_assertions)]
    if matches.is_present("show-browser") {
        config = config.with_headless(false);
    }

    Ok(config)
}

fn parse_limit(value: Option<&str>) -> anyhow::Result<usize> {
    match value {
        Some(limit) => limit.parse::<usize>().context("--limit must be a number"),
        None => Ok(30),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::new("BVC DataHub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bolsa de Valores de Caracas market summary scraper and API")
        .arg(
            Arg::with_name("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding the JSON snapshots")
                .takes_value(true)
                .global(true)
                .default_value("json"),
        )
        .arg(
            Arg::with_name("log-file")
                .long("log-file")
                .value_name("PATH")
                .help("Also append log lines to this file (empty to disable)")
                .takes_value(true)
                .global(true)
                .default_value("logs.log"),
        );

    // 开发模式下可以显示浏览器窗口
    #[cfg(debug_assertions)]
    let app = app.arg(
        Arg::with_name("show-browser")
            .long("show-browser")
            .help("Run Chrome with a visible window")
            .global(true)
            .takes_value(false),
    );

    let app = app
        .subcommand(browser_args(
            SubCommand::with_name("scrape")
                .about("Run one scrape cycle now and publish the snapshots")
                .arg(
                    Arg::with_name("from-file")
                        .long("from-file")
                        .value_name("PATH")
                        .help("Replay a saved page instead of driving a browser")
                        .takes_value(true),
                ),
        ))
        .subcommand(browser_args(
            SubCommand::with_name("serve")
                .about("Serve the snapshots over HTTP and refresh them on schedule")
                .arg(
                    Arg::with_name("bind")
                        .short('b')
                        .long("bind")
                        .value_name("ADDR")
                        .help("Listen address")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("schedule")
                        .long("schedule")
                        .value_name("HH:MM,HH:MM")
                        .help("Daily refresh times")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("timezone")
                        .long("timezone")
                        .value_name("TZ")
                        .help("Timezone of the refresh times")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("no-schedule")
                        .long("no-schedule")
                        .help("Only serve existing snapshots")
                        .takes_value(false),
                ),
        ))
        .subcommand(
            SubCommand::with_name("explore")
                .about("Print the published snapshots")
                .arg(
                    Arg::with_name("symbol")
                        .short('s')
                        .long("symbol")
                        .value_name("SYMBOL")
                        .help("Show the detail record for this symbol")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("limit")
                        .short('l')
                        .long("limit")
                        .value_name("LIMIT")
                        .help("Limit the number of rows to display")
                        .takes_value(true)
                        .default_value("30"),
                ),
        );

    let matches = app.get_matches();

    let config = base_config(&matches);
    logger::init(config.log_file.as_deref()).context("Cannot initialise logging")?;

    if let Some(sub) = matches.subcommand_matches("scrape") {
        let config = build_config(config, &matches, sub)?;
        let report = match sub.value_of("from-file") {
            Some(path) => DataService::new(&config, StaticPageOpener::from_file(path)).run_cycle().await,
            None => DataService::new(&config, WebDriverOpener::new(&config)?).run_cycle().await,
        };
        match report {
            Ok(report) => info!(
                "Published {} stocks, {} details ({} rows skipped)",
                report.stocks, report.details, report.skipped_rows
            ),
            Err(e) => {
                error!("Scrape failed, previous snapshots left untouched: {}", e);
                return Err(e.into());
            }
        }
    } else if let Some(sub) = matches.subcommand_matches("serve") {
        let mut config = build_config(config, &matches, sub)?;
        if let Some(times) = sub.value_of("schedule") {
            let times: Vec<&str> = times.split(',').collect();
            config = config.with_schedule(&times)?;
        }
        if let Some(tz) = sub.value_of("timezone") {
            config = config.with_timezone(tz)?;
        }
        if let Some(addr) = sub.value_of("bind") {
            config = config.with_bind_addr(addr);
        }
        let store = SnapshotStore::new(&config.data_dir);

        let mut orchestrator = if sub.is_present("no-schedule") {
            info!("Scheduled refresh disabled");
            None
        } else {
            let schedule = DailySchedule::from_config(&config)?;
            let service = DataService::new(&config, WebDriverOpener::new(&config)?);
            let mut orchestrator = Orchestrator::new(service, schedule);
            orchestrator.start();
            Some(orchestrator)
        };

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        };
        let served = api::serve(store, &config.bind_addr, shutdown).await;

        if let Some(orchestrator) = orchestrator.as_mut() {
            orchestrator.stop().await;
        }
        served?;
    } else if let Some(sub) = matches.subcommand_matches("explore") {
        let store = SnapshotStore::new(&config.data_dir);
        let limit = parse_limit(sub.value_of("limit"))?;

        if let Some(symbol) = sub.value_of("symbol") {
            match store.find_detail(symbol)? {
                Some(detail) => info!("{}", serde_json::to_string_pretty(&detail)?),
                None => warn!("Stock {} not found in {}", symbol, store.dir().display()),
            }
            return Ok(());
        }

        let stocks = store.stocks()?;
        info!("Found {} stocks in {}", stocks.len(), store.dir().display());
        let [name, symbol, price, cash, variation, traded] = StockSummaryRecord::FIELDS;
        info!("{:<36} {:<8} {:>14} {:>18} {:>10} {:>14}", name, symbol, price, cash, variation, traded);
        info!("{:-<105}", "");
        for stock in stocks.iter().take(limit) {
            info!(
                "{:<36} {:<8} {:>14} {:>18} {:>10} {:>14}",
                stock.name, stock.symbol, stock.last_price, stock.cash_amount, stock.variation, stock.securities_traded
            );
        }
        if stocks.len() > limit {
            info!("... and {} more rows", stocks.len() - limit);
        }

        match store.variable_income() {
            Ok(records) => {
                for r in records {
                    info!(
                        "Renta variable @ {}: {} operations, {} securities, Bs. {}",
                        r.observed_at, r.operations, r.securities_traded, r.cash_amount
                    );
                }
            }
            Err(e) => warn!("No variable income snapshot: {}", e),
        }
    } else {
        info!("No command specified. Use --help for usage information.");
    }

    Ok(())
}
