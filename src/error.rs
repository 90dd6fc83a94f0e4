use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum MarketDataError {
    #[display("failed to build HTTP client")]
    Client,
    #[display("request for {symbol} failed")]
    Request { symbol: String },
    #[display("failed to parse response for {symbol}")]
    ResponseParse { symbol: String },
    #[display("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },
}

#[derive(Debug, Display, Error)]
pub enum SeriesError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("column {column} does not align with timestamps")]
    ColumnLengthMismatch { column: String },
    #[display("timestamps not strictly increasing at row {index}")]
    NonMonotonicTimestamps { index: usize },
    #[display("bar {index} violates low <= open/close <= high")]
    InvalidBar { index: usize },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum RankError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("degenerate input for {symbol}: previous close is zero")]
    DegenerateInput { symbol: String },
}

#[derive(Debug, Display, Error)]
pub enum ProjectionError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("indicator computation failed")]
    Indicator,
}
