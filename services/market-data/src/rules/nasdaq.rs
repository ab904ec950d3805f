//! Dividends of foreign shares from NASDAQ
//!
//! Triggered by new record dates of `-RM` tickers. Downloads the dividend
//! history only when some record date is missing from `nasdaq_div/{ticker}`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use persistence::TableRead;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use types::dividend::{is_foreign_ticker, Currency, CurrencyDiv, DivStatus, FOREIGN_SUFFIX};
use types::errors::DataError;
use types::ids::Group;
use types::table::Table;

use super::div_status::{statuses, uncovered, StatusSelector};
use super::RuleContext;
use crate::clients::http::fetch_json;
use crate::ports::Gateway;
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "NASDAQRule";

/// The API rejects requests without a browser agent.
const AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.4 Safari/605.1.15";
const NO_DATE: &str = "N/A";
const DATE_FORMAT: &str = "%m/%d/%Y";
const CURRENCY_PREFIX: &str = "$";

#[derive(Debug, Deserialize)]
struct Response {
    data: Data,
}

#[derive(Debug, Deserialize)]
struct Data {
    dividends: Dividends,
}

#[derive(Debug, Deserialize)]
struct Dividends {
    #[serde(default)]
    rows: Vec<DividendRow>,
}

#[derive(Debug, Deserialize)]
struct DividendRow {
    #[serde(rename = "recordDate")]
    record_date: String,
    amount: String,
}

pub struct NasdaqGateway {
    http: Client,
    base: String,
    statuses: Arc<dyn TableRead<DivStatus>>,
}

impl NasdaqGateway {
    pub fn new(http: Client, base: impl Into<String>, statuses: Arc<dyn TableRead<DivStatus>>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            statuses,
        }
    }

    async fn download(&self, ticker: &str) -> Result<Vec<CurrencyDiv>, DataError> {
        let symbol = ticker.strip_suffix(FOREIGN_SUFFIX).unwrap_or(ticker);
        let url = format!("{}/api/quote/{symbol}/dividends", self.base);
        let request = self
            .http
            .get(&url)
            .query(&[("assetclass", "stocks")])
            .header(USER_AGENT, AGENT);

        let response: Response = fetch_json(request).await?;
        parse_rows(response.data.dividends.rows)
    }
}

#[async_trait]
impl Gateway<CurrencyDiv> for NasdaqGateway {
    async fn get(&self, table: &Table<CurrencyDiv>) -> Result<Vec<CurrencyDiv>, DataError> {
        let ticker = table.name().as_str();
        let statuses = statuses(self.statuses.as_ref()).await?;

        if !uncovered(&statuses.rows, ticker, &table.rows) {
            return Ok(Vec::new());
        }

        let mut rows = self.download(ticker).await?;
        rows.sort_by_key(|row| row.date);

        if rows == table.rows {
            return Ok(Vec::new());
        }
        Ok(rows)
    }
}

fn parse_rows(rows: Vec<DividendRow>) -> Result<Vec<CurrencyDiv>, DataError> {
    rows.into_iter()
        .filter(|row| row.record_date != NO_DATE)
        .map(|row| {
            let date = NaiveDate::parse_from_str(&row.record_date, DATE_FORMAT)
                .map_err(|err| DataError::gateway(&format!("can't parse date {}", row.record_date), err))?;
            let amount = row
                .amount
                .strip_prefix(CURRENCY_PREFIX)
                .ok_or_else(|| DataError::Gateway(format!("wrong currency prefix {}", row.amount)))?;
            let value: Decimal = amount
                .replace(',', "")
                .parse()
                .map_err(|err| DataError::gateway(&format!("can't parse dividend {}", row.amount), err))?;

            Ok(CurrencyDiv {
                date: Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
                value,
                currency: Currency::USD,
            })
        })
        .collect()
}

pub fn rule(ctx: &RuleContext) -> UpdateRule<CurrencyDiv> {
    let statuses: Arc<dyn TableRead<DivStatus>> = Arc::new(ctx.repo::<DivStatus>());

    UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<CurrencyDiv>()),
        StatusSelector::new(statuses.clone(), Group::NasdaqDiv, is_foreign_ticker),
        NasdaqGateway::new(ctx.http.clone(), ctx.sources.nasdaq.clone(), statuses),
        validators::ordered_dates::<CurrencyDiv>,
        WriteMode::Replace,
        ctx.timeout,
        ctx.clock.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use persistence::{MemoryStore, Repo, TableWrite};
    use serde_json::json;
    use types::ids::TableId;
    use wiremock::matchers::{header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn usd(date: DateTime<Utc>, cents: i64) -> CurrencyDiv {
        CurrencyDiv {
            date,
            value: Decimal::new(cents, 2),
            currency: Currency::USD,
        }
    }

    async fn gateway(server: &MockServer) -> NasdaqGateway {
        let repo = Repo::<DivStatus>::new(Arc::new(MemoryStore::new()));
        repo.replace(&Table::new(
            TableId::singleton(Group::DivStatus),
            Utc::now(),
            vec![DivStatus {
                ticker: "AAPL-RM".to_string(),
                date: day(2024, 5, 13),
            }],
        ))
        .await
        .unwrap();

        NasdaqGateway::new(Client::new(), server.uri(), Arc::new(repo))
    }

    async fn mount(server: &MockServer) {
        let body = json!({
            "data": {
                "dividends": {
                    "rows": [
                        {"recordDate": "05/13/2024", "amount": "$0.25"},
                        {"recordDate": "N/A", "amount": "$0.10"},
                        {"recordDate": "02/12/2024", "amount": "$0.24"}
                    ]
                }
            }
        });
        Mock::given(method("GET"))
            .and(path("/api/quote/AAPL/dividends"))
            .and(query_param("assetclass", "stocks"))
            .and(header_regex("user-agent", "^Mozilla/5\\.0 "))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_download_sorted_rows() {
        let server = MockServer::start().await;
        mount(&server).await;
        let gateway = gateway(&server).await;

        let table = Table::empty(TableId::new(Group::NasdaqDiv, "AAPL-RM"));
        let rows = gateway.get(&table).await.unwrap();

        assert_eq!(rows, vec![usd(day(2024, 2, 12), 24), usd(day(2024, 5, 13), 25)]);
    }

    #[tokio::test]
    async fn test_covered_dates_skip_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let gateway = gateway(&server).await;

        let table = Table::new(
            TableId::new(Group::NasdaqDiv, "AAPL-RM"),
            Utc::now(),
            vec![usd(day(2024, 5, 13), 25)],
        );
        assert!(gateway.get(&table).await.unwrap().is_empty());
    }

    #[test]
    fn test_wrong_currency_prefix() {
        let rows = vec![DividendRow {
            record_date: "05/13/2024".to_string(),
            amount: "€0.25".to_string(),
        }];
        assert!(parse_rows(rows).is_err());
    }
}
