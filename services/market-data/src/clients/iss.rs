//! MOEX ISS client
//!
//! ISS answers with named table blocks:
//!
//! ```text
//! { "candles": { "columns": ["open", "close", ...], "data": [[1.0, 2.0, ...], ...] } }
//! ```
//!
//! Long tables are paginated with the `start` parameter; a page without rows
//! ends the listing.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use types::candle::{Candle, Index};
use types::dates::TradingDate;
use types::errors::DataError;
use types::security::Security;

use super::http::fetch_json;

pub const DEFAULT_ISS_URL: &str = "https://iss.moex.com";

#[derive(Debug, Deserialize)]
struct Block {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
}

type Blocks = HashMap<String, Block>;

impl Block {
    fn column(&self, name: &str) -> Result<usize, DataError> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| DataError::Gateway(format!("ISS block has no column {name}")))
    }

    fn rows(&self) -> impl Iterator<Item = IssRow<'_>> {
        self.data.iter().map(move |row| IssRow { block: self, row })
    }
}

struct IssRow<'a> {
    block: &'a Block,
    row: &'a [Value],
}

impl IssRow<'_> {
    fn value(&self, name: &str) -> Result<&Value, DataError> {
        let n = self.block.column(name)?;
        self.row
            .get(n)
            .ok_or_else(|| DataError::Gateway(format!("ISS row too short for {name}")))
    }

    fn string(&self, name: &str) -> Result<String, DataError> {
        match self.value(name)? {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            other => Ok(other.to_string()),
        }
    }

    fn date(&self, name: &str) -> Result<DateTime<Utc>, DataError> {
        parse_date(&self.string(name)?)
    }

    fn decimal(&self, name: &str) -> Result<Decimal, DataError> {
        match self.value(name)? {
            Value::Null => Ok(Decimal::ZERO),
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s),
            other => Err(DataError::Gateway(format!("ISS {name} is not a number: {other}"))),
        }
    }

    fn integer(&self, name: &str) -> Result<u32, DataError> {
        self.value(name)?
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| DataError::Gateway(format!("ISS {name} is not an integer")))
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, DataError> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|err| DataError::gateway(&format!("can't parse number {s}"), err))
}

/// `2024-01-09` or `2024-01-09 18:59:59`, interpreted as UTC.
fn parse_date(s: &str) -> Result<DateTime<Utc>, DataError> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|err| DataError::gateway(&format!("can't parse date {s}"), err))?;
    Ok(Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone)]
pub struct IssClient {
    http: Client,
    base: String,
}

impl IssClient {
    pub fn new(http: Client, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn blocks(&self, path: &str, query: &[(&str, String)]) -> Result<Blocks, DataError> {
        let url = format!("{}/iss/{}.json", self.base, path);
        let mut params = vec![("iss.meta", "off".to_string())];
        params.extend(query.iter().cloned());
        fetch_json(self.http.get(&url).query(&params)).await
    }

    async fn block(&self, path: &str, name: &str, query: &[(&str, String)]) -> Result<Block, DataError> {
        self.blocks(path, query)
            .await?
            .remove(name)
            .ok_or_else(|| DataError::Gateway(format!("ISS {path} has no block {name}")))
    }

    /// Concatenate pages of a block until an empty one.
    async fn paginated(
        &self,
        path: &str,
        name: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Block>, DataError> {
        let mut pages = Vec::new();
        let mut start = 0;

        loop {
            let mut params = query.to_vec();
            params.push(("start", start.to_string()));
            let page = self.block(path, name, &params).await?;
            if page.data.is_empty() {
                return Ok(pages);
            }
            start += page.data.len();
            pages.push(page);
        }
    }

    /// Interval of dates with trading results.
    pub async fn market_dates(&self) -> Result<Vec<TradingDate>, DataError> {
        let block = self
            .block("history/engines/stock/markets/shares/dates", "dates", &[])
            .await?;

        block
            .rows()
            .map(|row| {
                Ok(TradingDate {
                    from: row.date("from")?,
                    till: row.date("till")?,
                })
            })
            .collect()
    }

    /// Daily history of a market index from `from` to `till` inclusive.
    pub async fn index_history(
        &self,
        ticker: &str,
        from: Option<NaiveDate>,
        till: NaiveDate,
    ) -> Result<Vec<Index>, DataError> {
        let path = format!("history/engines/stock/markets/index/securities/{ticker}");
        let query = interval(from, till);

        let mut rows = Vec::new();
        for page in self.paginated(&path, "history", &query).await? {
            for row in page.rows() {
                rows.push(Index {
                    date: row.date("TRADEDATE")?,
                    open: row.decimal("OPEN")?,
                    close: row.decimal("CLOSE")?,
                    high: row.decimal("HIGH")?,
                    low: row.decimal("LOW")?,
                    turnover: row.decimal("VALUE")?,
                });
            }
        }
        Ok(rows)
    }

    /// Daily candles of a security from `from` to `till` inclusive.
    pub async fn candles(
        &self,
        engine: &str,
        market: &str,
        ticker: &str,
        from: Option<NaiveDate>,
        till: NaiveDate,
    ) -> Result<Vec<Candle>, DataError> {
        let path = format!("engines/{engine}/markets/{market}/securities/{ticker}/candles");
        let mut query = interval(from, till);
        query.push(("interval", "24".to_string()));

        let mut rows = Vec::new();
        for page in self.paginated(&path, "candles", &query).await? {
            for row in page.rows() {
                rows.push(Candle {
                    begin: row.date("begin")?,
                    end: row.date("end")?,
                    open: row.decimal("open")?,
                    close: row.decimal("close")?,
                    high: row.decimal("high")?,
                    low: row.decimal("low")?,
                    value: row.decimal("value")?,
                    volume: row.decimal("volume")?,
                });
            }
        }
        Ok(rows)
    }

    /// Securities traded on a board of the stock engine.
    pub async fn board_securities(&self, market: &str, board: &str) -> Result<Vec<Security>, DataError> {
        let path = format!("engines/stock/markets/{market}/boards/{board}/securities");
        let query = [
            ("iss.only", "securities".to_string()),
            (
                "securities.columns",
                "SECID,LOTSIZE,ISIN,BOARDID,SECTYPE,INSTRID".to_string(),
            ),
        ];
        let block = self.block(&path, "securities", &query).await?;

        block
            .rows()
            .map(|row| {
                Ok(Security {
                    ticker: row.string("SECID")?,
                    lot: row.integer("LOTSIZE")?,
                    isin: row.string("ISIN")?,
                    board: row.string("BOARDID")?,
                    kind: row.string("SECTYPE")?,
                    instrument: row.string("INSTRID")?,
                })
            })
            .collect()
    }
}

fn interval(from: Option<NaiveDate>, till: NaiveDate) -> Vec<(&'static str, String)> {
    let mut query = vec![("till", till.format("%Y-%m-%d").to_string())];
    if let Some(from) = from {
        query.push(("from", from.format("%Y-%m-%d").to_string()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> IssClient {
        IssClient::new(Client::new(), server.uri())
    }

    #[test]
    fn test_parse_date_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2024-01-09").unwrap(), expected);
        assert_eq!(parse_date("2024-01-09 00:00:00").unwrap(), expected);
        assert!(parse_date("09.01.2024").is_err());
    }

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(parse_decimal("98.5").unwrap(), Decimal::new(985, 1));
        assert_eq!(parse_decimal("1.5e3").unwrap(), Decimal::from(1500));
    }

    #[tokio::test]
    async fn test_market_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/iss/history/engines/stock/markets/shares/dates.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dates": {"columns": ["from", "till"], "data": [["1997-03-24", "2024-01-10"]]}
            })))
            .mount(&server)
            .await;

        let dates = client(&server).market_dates().await.unwrap();
        assert_eq!(
            dates,
            vec![TradingDate {
                from: Utc.with_ymd_and_hms(1997, 3, 24, 0, 0, 0).unwrap(),
                till: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            }]
        );
    }

    #[tokio::test]
    async fn test_candles_follow_pages() {
        let server = MockServer::start().await;
        let candles_path = "/iss/engines/currency/markets/selt/securities/USD000UTSTOM/candles.json";
        let columns = json!(["open", "close", "high", "low", "value", "volume", "begin", "end"]);

        Mock::given(method("GET"))
            .and(path(candles_path))
            .and(query_param("start", "0"))
            .and(query_param("interval", "24"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candles": {"columns": columns, "data": [
                    [97.5, 98.0, 98.2, 97.1, 1000.0, 10, "2024-01-09 00:00:00", "2024-01-09 23:59:59"]
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(candles_path))
            .and(query_param("start", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candles": {"columns": columns, "data": []}
            })))
            .mount(&server)
            .await;

        let till = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let candles = client(&server)
            .candles("currency", "selt", "USD000UTSTOM", None, till)
            .await
            .unwrap();

        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, Decimal::from(98));
        assert_eq!(candles[0].volume, Decimal::from(10));
    }

    #[tokio::test]
    async fn test_board_securities() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/iss/engines/stock/markets/shares/boards/TQBR/securities.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "securities": {
                    "columns": ["SECID", "LOTSIZE", "ISIN", "BOARDID", "SECTYPE", "INSTRID"],
                    "data": [["SBERP", 10, "RU0009029557", "TQBR", "2", "EQIN"]]
                }
            })))
            .mount(&server)
            .await;

        let securities = client(&server).board_securities("shares", "TQBR").await.unwrap();
        assert_eq!(securities.len(), 1);
        assert!(securities[0].is_preferred());
        assert_eq!(securities[0].lot, 10);
    }

    #[tokio::test]
    async fn test_bad_status_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).market_dates().await.unwrap_err();
        assert!(matches!(err, DataError::Gateway(msg) if msg.contains("503")));
    }
}
