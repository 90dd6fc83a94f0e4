use serde::Serialize;

use crate::model::WatchlistRow;
use crate::report::{Analysis, Reporter};

/// One JSON document per report on stdout.
pub struct JsonReporter;

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Document<'a> {
    Watchlist { rows: &'a [WatchlistRow] },
    Analysis(&'a Analysis),
    NoData { symbol: &'a str, reason: &'a str },
}

fn render(document: &Document<'_>) -> Option<String> {
    match serde_json::to_string(document) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize report");
            None
        }
    }
}

fn emit(document: Document<'_>) {
    if let Some(json) = render(&document) {
        println!("{json}");
    }
}

impl Reporter for JsonReporter {
    fn watchlist(&self, rows: &[WatchlistRow]) {
        emit(Document::Watchlist { rows });
    }

    fn analysis(&self, analysis: &Analysis) {
        emit(Document::Analysis(analysis));
    }

    fn no_data(&self, symbol: &str, reason: &str) {
        emit(Document::NoData { symbol, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::{sample_analysis, sample_rows};
    use serde_json::Value;

    fn parse(document: Document<'_>) -> Value {
        serde_json::from_str(&render(&document).unwrap()).unwrap()
    }

    #[test]
    fn watchlist_document_is_tagged() {
        let rows = sample_rows();
        let value = parse(Document::Watchlist { rows: &rows });
        assert_eq!(value["kind"], "watchlist");
        assert_eq!(value["rows"][0]["symbol"], "BBRI");
        assert_eq!(value["rows"][1]["percent_change"], -2.86);
    }

    #[test]
    fn analysis_document_carries_nulls_for_warmup() {
        let analysis = sample_analysis();
        let value = parse(Document::Analysis(&analysis));
        assert_eq!(value["kind"], "analysis");
        assert_eq!(value["symbol"], "BBRI");
        assert_eq!(value["indicators"]["rsi"], 57.3);
        assert!(value["indicators"]["stoch_k"].is_null());
        assert_eq!(value["projection"].as_array().unwrap().len(), 3);
        assert_eq!(value["projection"][0]["timestamp"], "2026-01-06T00:00:00Z");
    }

    #[test]
    fn no_data_document() {
        let value = parse(Document::NoData {
            symbol: "NOPE",
            reason: "symbol not found",
        });
        assert_eq!(value["kind"], "no_data");
        assert_eq!(value["reason"], "symbol not found");
    }
}
