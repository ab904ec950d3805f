pub mod api;
pub mod edit;
pub mod tickers;
