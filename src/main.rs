mod config;
mod error;
mod indicator;
mod market;
mod model;
mod projection;
mod ranker;
mod report;
mod series;

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use nonzero_ext::nonzero;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use error::{MarketDataError, ProjectionError, SeriesError};
use indicator::bundle::IndicatorBundle;
use market::MarketData;
use market::yahoo::YahooMarketData;
use model::{Interval, Series};
use projection::{ProjectionRequest, Projector, seeded_rng};
use ranker::RankingRequest;
use report::json::JsonReporter;
use report::terminal::TerminalReporter;
use report::{Analysis, Reporter};
use series::{NormalizeOptions, normalize};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("market data error")]
    MarketData,
    #[display("analysis error")]
    Analysis,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "stock-projector", about = "Equity watchlist ranking and short-horizon price projection")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Rank the configured watchlist by recent change
    Watchlist,
    /// Indicators and projection for one symbol
    Analyze {
        /// Symbol without exchange suffix; defaults to the top-ranked watchlist symbol
        #[arg(short, long)]
        symbol: Option<String>,
    },
    /// Refresh the watchlist and analysis until Ctrl+C
    Watch {
        #[arg(short, long)]
        symbol: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    let app = App::new(config, cli.output)?;

    match cli.command {
        Command::Watchlist => {
            app.watchlist().await?;
        }
        Command::Analyze { symbol } => {
            app.analyze(symbol).await?;
        }
        Command::Watch { symbol } => {
            app.watch(symbol).await?;
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

struct App {
    config: AppConfig,
    market: Arc<dyn MarketData>,
    reporter: Box<dyn Reporter>,
    ranking: RankingRequest,
    projector: Projector,
}

impl App {
    fn new(config: AppConfig, output: OutputFormat) -> Result<Self, Report<AppError>> {
        let rps = NonZeroU32::new(config.market.requests_per_second).unwrap_or(nonzero!(5u32));
        let market: Arc<dyn MarketData> = Arc::new(
            YahooMarketData::new(&config.market.base_url, rps)
                .change_context(AppError::MarketData)?,
        );
        let reporter: Box<dyn Reporter> = match output {
            OutputFormat::Text => Box::new(TerminalReporter),
            OutputFormat::Json => Box::new(JsonReporter),
        };
        let ranking = config
            .watchlist
            .ranking_request()
            .change_context(AppError::Config)?;
        let projector = Projector::new(
            config
                .projection
                .settings()
                .change_context(AppError::Config)?,
        )
        .change_context(AppError::Config)?;

        Ok(Self {
            config,
            market,
            reporter,
            ranking,
            projector,
        })
    }

    /// Fetch the watchlist basket, rank it and report it. Returns the ranked
    /// display symbols.
    async fn watchlist(&self) -> Result<Vec<String>, Report<AppError>> {
        let basket = self.fetch_basket().await?;
        let ranking = ranker::rank(&basket, &self.ranking);
        info!(
            ranked = ranking.rows.len(),
            failed = ranking.failures.len(),
            "watchlist ranked"
        );
        self.reporter.watchlist(&ranking.rows);
        Ok(ranking.rows.into_iter().map(|row| row.symbol).collect())
    }

    /// Every symbol is fetched on its own task; the market client's rate
    /// limiter keeps the burst within the configured request rate.
    async fn fetch_basket(&self) -> Result<Vec<Series>, Report<AppError>> {
        let watchlist = &self.config.watchlist;
        let interval = config::parse_interval(&watchlist.interval, "watchlist.interval")
            .change_context(AppError::Config)?;

        let mut handles = Vec::with_capacity(watchlist.symbols.len());
        for symbol in &watchlist.symbols {
            let market = Arc::clone(&self.market);
            let fetch_symbol = self.config.market.fetch_symbol(symbol);
            let shown = self.config.market.display_symbol(&fetch_symbol).to_string();
            let range = watchlist.range.clone();
            let handle = tokio::spawn(async move {
                match fetch_series(
                    market.as_ref(),
                    &fetch_symbol,
                    &shown,
                    &range,
                    interval,
                    &NormalizeOptions::change_only(),
                )
                .await
                {
                    Ok(series) => Some(series),
                    Err(e) => {
                        tracing::warn!(symbol = %shown, error = ?e, "watchlist fetch failed (continuing)");
                        None
                    }
                }
            });
            handles.push(handle);
        }

        let mut basket = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(series) = handle.await.change_context(AppError::Runtime)? {
                basket.push(series);
            }
        }
        Ok(basket)
    }

    async fn analyze(&self, symbol: Option<String>) -> Result<(), Report<AppError>> {
        let symbol = match symbol {
            Some(symbol) => symbol,
            None => match self.top_symbol().await? {
                Some(symbol) => symbol,
                None => {
                    self.reporter.no_data("watchlist", "no symbol could be ranked");
                    return Ok(());
                }
            },
        };

        let fetch_symbol = self.config.market.fetch_symbol(&symbol);
        let shown = self.config.market.display_symbol(&fetch_symbol).to_string();

        match self.analyze_symbol(&fetch_symbol, &shown).await {
            Ok(analysis) => {
                self.reporter.analysis(&analysis);
                Ok(())
            }
            Err(report) => match no_data_reason(&report) {
                Some(reason) => {
                    tracing::warn!(symbol = %shown, error = ?report, "analysis skipped");
                    self.reporter.no_data(&shown, &reason);
                    Ok(())
                }
                None => Err(report),
            },
        }
    }

    async fn top_symbol(&self) -> Result<Option<String>, Report<AppError>> {
        let basket = self.fetch_basket().await?;
        let ranking = ranker::rank(&basket, &self.ranking);
        Ok(ranking.rows.into_iter().next().map(|row| row.symbol))
    }

    async fn analyze_symbol(
        &self,
        fetch_symbol: &str,
        shown: &str,
    ) -> Result<Analysis, Report<AppError>> {
        let analysis = &self.config.analysis;
        let interval = config::parse_interval(&analysis.interval, "analysis.interval")
            .change_context(AppError::Config)?;
        let indicator_settings = self.config.indicators.settings();
        let min_bars = IndicatorBundle::required_bars(&indicator_settings)
            .change_context(AppError::Config)?
            .max(self.projector.required_bars());
        let options = NormalizeOptions {
            min_bars,
            invalid_bars: config::parse_invalid_bars(&analysis.invalid_bars)
                .change_context(AppError::Config)?,
        };

        let series = fetch_series(
            self.market.as_ref(),
            fetch_symbol,
            shown,
            &analysis.range,
            interval,
            &options,
        )
        .await?;

        let bundle = IndicatorBundle::compute(&series, &indicator_settings)
            .change_context(AppError::Analysis)?;

        let request = ProjectionRequest {
            horizon: self.config.projection.horizon,
            step: Some(interval.duration()),
        };
        let mut rng = seeded_rng(self.config.projection.seed);
        let projection = self
            .projector
            .project(&series, &request, &mut rng)
            .change_context(AppError::Analysis)?;

        let last = series.bars().last().ok_or_else(|| {
            Report::new(AppError::Analysis).attach(format!("{shown}: empty series"))
        })?;

        Ok(Analysis {
            symbol: shown.to_string(),
            interval: interval.as_str().to_string(),
            bars: series.len(),
            last_timestamp: last.timestamp,
            last_close: last.close,
            method: self.projector.method_name().to_string(),
            indicators: bundle.latest(),
            projection,
        })
    }

    async fn watch(&self, symbol: Option<String>) -> Result<(), Report<AppError>> {
        let cancel = CancellationToken::new();
        let refresh = Duration::from_secs(self.config.general.refresh_secs);

        let signal_cancel = cancel.clone();
        let signal_handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl+c received, shutting down");
            }
            signal_cancel.cancel();
        });

        info!(refresh_secs = refresh.as_secs(), "watch started");

        loop {
            let cycle = async {
                let ranked = self.watchlist().await?;
                let target = symbol.clone().or_else(|| ranked.into_iter().next());
                match target {
                    Some(target) => self.analyze(Some(target)).await,
                    None => {
                        self.reporter.no_data("watchlist", "no symbol could be ranked");
                        Ok(())
                    }
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                result = cycle => {
                    if let Err(e) = result {
                        tracing::error!(error = ?e, "refresh failed (continuing)");
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(refresh) => {}
            }
        }

        signal_handle.abort();
        info!("shutdown complete");
        Ok(())
    }
}

/// Fetch `range` of bars for `fetch_symbol` and normalize them into a series
/// named `shown`.
async fn fetch_series(
    market: &dyn MarketData,
    fetch_symbol: &str,
    shown: &str,
    range: &str,
    interval: Interval,
    options: &NormalizeOptions,
) -> Result<Series, Report<AppError>> {
    info!(
        source = market.name(),
        symbol = fetch_symbol,
        range,
        interval = %interval,
        "fetching bars"
    );

    let mut raw = market
        .fetch_bars(fetch_symbol, range, interval)
        .await
        .change_context(AppError::MarketData)?;
    raw.symbol = shown.to_string();

    normalize(raw, options).change_context(AppError::Analysis)
}

/// Failures that mean "nothing to show" rather than a broken run.
fn no_data_reason(report: &Report<AppError>) -> Option<String> {
    if let Some(e @ MarketDataError::SymbolNotFound { .. }) =
        report.downcast_ref::<MarketDataError>()
    {
        return Some(e.to_string());
    }
    if let Some(e @ SeriesError::InsufficientData { .. }) = report.downcast_ref::<SeriesError>() {
        return Some(e.to_string());
    }
    if let Some(e @ ProjectionError::InsufficientData { .. }) =
        report.downcast_ref::<ProjectionError>()
    {
        return Some(e.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WatchlistRow;
    use crate::series::RawBars;
    use crate::series::RawColumn;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    /// Serves canned closes keyed by symbol.
    struct FakeMarket {
        closes: Vec<(&'static str, Vec<f64>)>,
    }

    impl MarketData for FakeMarket {
        fn name(&self) -> &str {
            "fake"
        }

        fn fetch_bars(
            &self,
            symbol: &str,
            _range: &str,
            _interval: Interval,
        ) -> BoxFuture<'_, Result<RawBars, Report<MarketDataError>>> {
            let symbol = symbol.to_owned();
            Box::pin(async move {
                let Some((_, closes)) = self.closes.iter().find(|(s, _)| *s == symbol) else {
                    return Err(Report::new(MarketDataError::SymbolNotFound { symbol }));
                };
                let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
                let column = RawColumn::Flat(closes.iter().map(|&c| Some(c)).collect());
                Ok(RawBars {
                    symbol,
                    timestamps: (0..closes.len())
                        .map(|i| start + ChronoDuration::days(i as i64))
                        .collect(),
                    open: column.clone(),
                    high: column.clone(),
                    low: column.clone(),
                    close: column,
                    volume: RawColumn::Flat(vec![Some(1000.0); closes.len()]),
                })
            })
        }
    }

    /// Records what each command reported, one line per call.
    #[derive(Clone, Default)]
    struct RecordingReporter {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Reporter for RecordingReporter {
        fn watchlist(&self, rows: &[WatchlistRow]) {
            let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
            self.events
                .lock()
                .unwrap()
                .push(format!("watchlist:{}", symbols.join(",")));
        }

        fn analysis(&self, analysis: &Analysis) {
            self.events
                .lock()
                .unwrap()
                .push(format!("analysis:{}", analysis.symbol));
        }

        fn no_data(&self, symbol: &str, _reason: &str) {
            self.events.lock().unwrap().push(format!("no_data:{symbol}"));
        }
    }

    fn ramp(len: usize) -> Vec<f64> {
        (0..len).map(|i| 100.0 + i as f64).collect()
    }

    fn test_app(market: FakeMarket, reporter: RecordingReporter) -> App {
        let config: AppConfig = toml::from_str(
            r#"
[general]
[watchlist]
symbols = ["BBRI", "GOTO", "NOPE"]
[projection]
seed = 7
"#,
        )
        .unwrap();
        let ranking = config.watchlist.ranking_request().unwrap();
        let projector = Projector::new(config.projection.settings().unwrap()).unwrap();
        App {
            config,
            market: Arc::new(market),
            reporter: Box::new(reporter),
            ranking,
            projector,
        }
    }

    fn basket_market() -> FakeMarket {
        FakeMarket {
            closes: vec![("BBRI.JK", ramp(60)), ("GOTO.JK", vec![50.0, 45.0])],
        }
    }

    #[tokio::test]
    async fn watchlist_ranks_basket_and_skips_failed_fetches() {
        let reporter = RecordingReporter::default();
        let app = test_app(basket_market(), reporter.clone());

        let ranked = app.watchlist().await.unwrap();

        assert_eq!(ranked, vec!["BBRI", "GOTO"]);
        assert_eq!(*reporter.events.lock().unwrap(), vec!["watchlist:BBRI,GOTO"]);
    }

    #[tokio::test]
    async fn analyze_upper_cases_typed_symbol() {
        let reporter = RecordingReporter::default();
        let app = test_app(basket_market(), reporter.clone());

        app.analyze(Some("bbri".into())).await.unwrap();

        assert_eq!(*reporter.events.lock().unwrap(), vec!["analysis:BBRI"]);
    }

    #[tokio::test]
    async fn analyze_defaults_to_top_ranked_symbol() {
        let reporter = RecordingReporter::default();
        let app = test_app(basket_market(), reporter.clone());

        app.analyze(None).await.unwrap();

        assert_eq!(*reporter.events.lock().unwrap(), vec!["analysis:BBRI"]);
    }

    #[tokio::test]
    async fn analyze_reports_no_data_instead_of_failing() {
        let reporter = RecordingReporter::default();
        let app = test_app(basket_market(), reporter.clone());

        app.analyze(Some("nope".into())).await.unwrap();
        app.analyze(Some("GOTO".into())).await.unwrap();

        assert_eq!(
            *reporter.events.lock().unwrap(),
            vec!["no_data:NOPE", "no_data:GOTO"]
        );
    }

    #[tokio::test]
    async fn fetch_series_renames_to_display_symbol() {
        let market = FakeMarket {
            closes: vec![("BBRI.JK", vec![100.0, 101.0, 102.0])],
        };
        let series = fetch_series(
            &market,
            "BBRI.JK",
            "BBRI",
            "5d",
            Interval::Day1,
            &NormalizeOptions::change_only(),
        )
        .await
        .unwrap();
        assert_eq!(series.symbol(), "BBRI");
        assert_eq!(series.len(), 3);
    }

    #[tokio::test]
    async fn unknown_symbol_is_no_data() {
        let market = FakeMarket { closes: vec![] };
        let err = fetch_series(
            &market,
            "NOPE.JK",
            "NOPE",
            "1y",
            Interval::Day1,
            &NormalizeOptions::change_only(),
        )
        .await
        .unwrap_err();
        let reason = no_data_reason(&err).unwrap();
        assert!(reason.contains("NOPE.JK"));
    }

    #[tokio::test]
    async fn short_history_is_no_data() {
        let market = FakeMarket {
            closes: vec![("BBRI.JK", vec![100.0; 10])],
        };
        let options = NormalizeOptions {
            min_bars: 40,
            ..NormalizeOptions::change_only()
        };
        let err = fetch_series(&market, "BBRI.JK", "BBRI", "1y", Interval::Day1, &options)
            .await
            .unwrap_err();
        assert!(no_data_reason(&err).is_some());
    }

    #[test]
    fn other_failures_are_not_no_data() {
        let report = Report::new(MarketDataError::Request {
            symbol: "BBRI.JK".into(),
        })
        .change_context(AppError::MarketData);
        assert!(no_data_reason(&report).is_none());
    }
}
