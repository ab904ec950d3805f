//! Dividends of domestic shares from the registry closings site
//!
//! Triggered by new record dates of domestic tickers. The page of a ticker
//! holds a table of payments:
//!
//! ```text
//! | Дата закрытия реестра  | Дивиденд на обыкновенную | Дивиденд на привилегированную |
//! | 11.05.2023 (до 10.05)  | 25 руб.                  | 25 руб.                       |
//! | ИТОГО за 2023          | ...                      | ...                           |
//! ```
//!
//! Preferred shares share the page of the ordinary ones and use the third
//! column.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use persistence::TableRead;
use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector as Css};
use types::dividend::{is_foreign_ticker, Currency, CurrencyDiv, DivStatus};
use types::errors::DataError;
use types::ids::{Group, TableId};
use types::security::Security;
use types::table::Table;

use super::div_status::{statuses, uncovered, StatusSelector};
use super::RuleContext;
use crate::clients::http::fetch_text;
use crate::ports::Gateway;
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "ReestryRule";

const PREFERRED_SUFFIX: &str = "P";
const RUAL: &str = "_RUAL";
const RUALR: &str = "_RUALR";
const DATE_FORMAT: &str = "%d.%m.%Y";
const COMMON_HEADER: &str = "обыкновенную";
const PREFERRED_HEADER: &str = "привилегированную";
const SKIP_MARKERS: [&str; 2] = ["ИТОГО", "НЕ ВЫПЛАЧИВАТЬ"];

fn css(selector: &str) -> Result<Css, DataError> {
    Css::parse(selector).map_err(|err| DataError::gateway(&format!("bad selector {selector}"), err))
}

fn text(row: ElementRef<'_>, cell: &Css) -> String {
    row.select(cell)
        .next()
        .map(|td| td.text().collect())
        .unwrap_or_default()
}

/// Compiled patterns of the payments table.
pub struct PageParser {
    date: Regex,
    value: Regex,
}

impl PageParser {
    pub fn new() -> Result<Self, DataError> {
        let date = Regex::new(r"\d{1,2}\.\d{2}\.\d{4}")
            .map_err(|err| DataError::gateway("bad date pattern", err))?;
        let value = Regex::new(r"(\d+|\d+,\d+).(руб|USD|\$)")
            .map_err(|err| DataError::gateway("bad value pattern", err))?;

        Ok(Self { date, value })
    }

    /// Payments in page order.
    pub fn parse(&self, page: &str, preferred: bool) -> Result<Vec<CurrencyDiv>, DataError> {
        let html = Html::parse_document(page);
        let rows_css = css("tbody tr")?;
        let date_css = css("td:nth-child(1)")?;
        let common_css = css("td:nth-child(2)")?;
        let preferred_css = css("td:nth-child(3)")?;
        let value_css = if preferred { &preferred_css } else { &common_css };

        let mut rows = html.select(&rows_css);
        let header = rows
            .next()
            .ok_or_else(|| DataError::Gateway("can't find dividends table".to_string()))?;

        if preferred {
            let title = text(header, &preferred_css);
            if !title.contains(PREFERRED_HEADER) {
                return Err(DataError::Gateway(format!("can't find preferred in header - {title}")));
            }
        }
        let title = text(header, &common_css);
        if !title.contains(COMMON_HEADER) {
            return Err(DataError::Gateway(format!("can't find common in header - {title}")));
        }

        let mut divs = Vec::new();
        for row in rows {
            let content: String = row.text().collect();
            if SKIP_MARKERS.iter().any(|marker| content.contains(marker)) {
                continue;
            }
            divs.push(self.parse_row(&text(row, &date_css), &text(row, value_css))?);
        }

        Ok(divs)
    }

    fn parse_row(&self, date: &str, value: &str) -> Result<CurrencyDiv, DataError> {
        let found = self
            .date
            .find(date)
            .ok_or_else(|| DataError::Gateway(format!("can't find date in {date}")))?;
        let day = NaiveDate::parse_from_str(found.as_str(), DATE_FORMAT)
            .map_err(|err| DataError::gateway(&format!("can't parse date {date}"), err))?;

        let caps = self
            .value
            .captures(value)
            .ok_or_else(|| DataError::Gateway(format!("can't parse value {value}")))?;
        let amount: Decimal = caps[1]
            .replacen(',', ".", 1)
            .parse()
            .map_err(|err| DataError::gateway(&format!("can't parse dividend {}", &caps[1]), err))?;
        let currency = match &caps[2] {
            "руб" => Currency::RUR,
            "USD" | "$" => Currency::USD,
            other => return Err(DataError::Gateway(format!("can't parse currency - {other}"))),
        };

        Ok(CurrencyDiv {
            date: Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)),
            value: amount,
            currency,
        })
    }
}

/// Page path of a ticker.
pub fn page_name(ticker: &str, preferred: bool) -> &str {
    let ticker = match ticker.strip_suffix(PREFERRED_SUFFIX) {
        Some(common) if preferred => common,
        _ => ticker,
    };
    if ticker == RUAL {
        return RUALR;
    }
    ticker
}

pub struct ReestryGateway {
    http: Client,
    base: String,
    parser: PageParser,
    statuses: Arc<dyn TableRead<DivStatus>>,
    securities: Arc<dyn TableRead<Security>>,
}

impl ReestryGateway {
    pub fn new(
        http: Client,
        base: impl Into<String>,
        statuses: Arc<dyn TableRead<DivStatus>>,
        securities: Arc<dyn TableRead<Security>>,
    ) -> Result<Self, DataError> {
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            parser: PageParser::new()?,
            statuses,
            securities,
        })
    }

    async fn is_preferred(&self, ticker: &str) -> Result<bool, DataError> {
        let securities = self.securities.get(&TableId::singleton(Group::Securities)).await?;
        securities
            .rows
            .iter()
            .find(|security| security.ticker == ticker)
            .map(Security::is_preferred)
            .ok_or_else(|| DataError::Gateway(format!("can't find {ticker} in securities")))
    }

    async fn download(&self, ticker: &str) -> Result<Vec<CurrencyDiv>, DataError> {
        let preferred = self.is_preferred(ticker).await?;
        let url = format!("{}/{}/", self.base, page_name(ticker, preferred));
        let page = fetch_text(self.http.get(&url)).await?;

        self.parser.parse(&page, preferred)
    }
}

#[async_trait]
impl Gateway<CurrencyDiv> for ReestryGateway {
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

pub fn rule(ctx: &RuleContext) -> Result<UpdateRule<CurrencyDiv>, DataError> {
    let statuses: Arc<dyn TableRead<DivStatus>> = Arc::new(ctx.repo::<DivStatus>());

    Ok(UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<CurrencyDiv>()),
        StatusSelector::new(statuses.clone(), Group::ReestryDiv, |ticker| {
            !is_foreign_ticker(ticker)
        }),
        ReestryGateway::new(
            ctx.http.clone(),
            ctx.sources.reestry.clone(),
            statuses,
            Arc::new(ctx.repo::<Security>()),
        )?,
        validators::ordered_dates::<CurrencyDiv>,
        WriteMode::Replace,
        ctx.timeout,
        ctx.clock.clone(),
    ))
}
