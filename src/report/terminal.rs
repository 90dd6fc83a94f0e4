use std::fmt::Write;

use crate::model::WatchlistRow;
use crate::report::{Analysis, Reporter};

/// Plain-text tables on stdout.
pub struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn watchlist(&self, rows: &[WatchlistRow]) {
        print!("{}", render_watchlist(rows));
    }

    fn analysis(&self, analysis: &Analysis) {
        print!("{}", render_analysis(analysis));
    }

    fn no_data(&self, symbol: &str, reason: &str) {
        tracing::warn!(symbol, reason, "no data");
        println!("{symbol}: no data ({reason})");
    }
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

pub fn render_watchlist(rows: &[WatchlistRow]) -> String {
    if rows.is_empty() {
        return "watchlist: no data\n".to_string();
    }
    let mut out = format!("{:<8} {:>12} {:>9}\n", "SYMBOL", "LAST", "CHANGE%");
    for row in rows {
        let _ = writeln!(
            out,
            "{:<8} {:>12.2} {:>+9.2}",
            row.symbol, row.last_price, row.percent_change
        );
    }
    out
}

pub fn render_analysis(analysis: &Analysis) -> String {
    let ind = &analysis.indicators;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({} bars @ {}) last close {:.2} at {}",
        analysis.symbol,
        analysis.bars,
        analysis.interval,
        analysis.last_close,
        analysis.last_timestamp.format("%Y-%m-%d %H:%M"),
    );
    let _ = writeln!(
        out,
        "  MA {}  BB [{}, {}]  RSI {}",
        cell(ind.ma),
        cell(ind.bollinger_lower),
        cell(ind.bollinger_upper),
        cell(ind.rsi),
    );
    let _ = writeln!(
        out,
        "  MACD {} / signal {}  Stoch %K {} %D {}",
        cell(ind.macd),
        cell(ind.macd_signal),
        cell(ind.stoch_k),
        cell(ind.stoch_d),
    );
    let _ = writeln!(out, "  projection ({}):", analysis.method);
    for point in &analysis.projection {
        let _ = writeln!(
            out,
            "    {}  {:.2}",
            point.timestamp.format("%Y-%m-%d %H:%M"),
            point.price
        );
    }
    out
}
