//! Consumer price index
//!
//! Triggered by new trading dates. The statistics page links a workbook with
//! monthly CPI since 1991:
//!
//! ```text
//! row 3:     |  1991  |  1992  | ...
//! row 5:  январь  | 106.2  | 345.3  | ...
//! ...
//! row 16: декабрь | 112.0  | 125.2  | ...
//! ```
//!
//! Cells are percentages of the previous month; rows are dated by the last
//! day of their month. The table is replaced only when a new month appears.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use chrono::{DateTime, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use encoding_rs::WINDOWS_1252;
use regex::Regex;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use types::cpi::Cpi;
use types::errors::DataError;
use types::ids::Group;
use types::table::Table;

use super::RuleContext;
use crate::clients::http::fetch_bytes;
use crate::ports::{Gateway, OnUpdate};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "CPIRule";

const SHEET: &str = "ИПЦ";
const HEADER_ROW: u32 = 3;
const FIRST_YEAR: i32 = 1991;
const FIRST_DATA_ROW: u32 = 5;
const FIRST_DATA_COL: u32 = 1;
const MONTHS: [&str; 12] = [
    "январь",
    "февраль",
    "март",
    "апрель",
    "май",
    "июнь",
    "июль",
    "август",
    "сентябрь",
    "октябрь",
    "ноябрь",
    "декабрь",
];

pub struct CpiGateway {
    http: Client,
    page: String,
    link: Regex,
}

impl CpiGateway {
    pub fn new(http: Client, page: impl Into<String>) -> Result<Self, DataError> {
        let link = Regex::new(r#"https?://[^"'\s<>]+?ipc[^"'\s<>]*?\.xlsx"#)
            .map_err(|err| DataError::gateway("bad xlsx link pattern", err))?;

        Ok(Self {
            http,
            page: page.into(),
            link,
        })
    }

    async fn workbook_url(&self) -> Result<Url, DataError> {
        let bytes = fetch_bytes(self.http.get(&self.page)).await?;
        let (page, _, _) = WINDOWS_1252.decode(&bytes);

        let link = self
            .link
            .find(&page)
            .ok_or_else(|| DataError::Gateway(format!("can't find CPI xlsx link at {}", self.page)))?;

        Url::parse(link.as_str()).map_err(|err| DataError::gateway("bad CPI xlsx link", err))
    }
}

#[async_trait]
impl Gateway<Cpi> for CpiGateway {
    async fn get(&self, table: &Table<Cpi>) -> Result<Vec<Cpi>, DataError> {
        let url = self.workbook_url().await?;
        let bytes = fetch_bytes(self.http.get(url)).await?;

        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
            .map_err(|err| DataError::gateway("can't open CPI xlsx", err))?;
        let sheet = workbook
            .worksheet_range(SHEET)
            .map_err(|err| DataError::gateway(&format!("can't read sheet {SHEET}"), err))?;

        let rows = parse_sheet(&sheet)?;

        match (table.last_row(), rows.last()) {
            (_, None) => Ok(Vec::new()),
            (None, Some(_)) => Ok(rows),
            (Some(old), Some(new)) if old.date < new.date => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }
}

fn cell_text(sheet: &Range<Data>, row: u32, col: u32) -> String {
    match sheet.get_value((row, col)) {
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Int(i)) => i.to_string(),
        _ => String::new(),
    }
}

fn cell_number(sheet: &Range<Data>, row: u32, col: u32) -> Result<Option<Decimal>, DataError> {
    let value = match sheet.get_value((row, col)) {
        None | Some(Data::Empty) => return Ok(None),
        Some(Data::Float(f)) => f
            .to_string()
            .parse()
            .map_err(|err| DataError::gateway(&format!("bad CPI value {f}"), err))?,
        Some(Data::Int(i)) => Decimal::from(*i),
        Some(Data::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Data::String(s)) => s
            .trim()
            .replace(',', ".")
            .parse()
            .map_err(|err| DataError::gateway(&format!("bad CPI value {s}"), err))?,
        Some(other) => return Err(DataError::Gateway(format!("bad CPI cell {other:?}"))),
    };
    Ok(Some(value))
}

fn validate_months(sheet: &Range<Data>) -> Result<(), DataError> {
    for (n, month) in (0u32..).zip(MONTHS) {
        let name = cell_text(sheet, FIRST_DATA_ROW + n, 0);
        if name != month {
            return Err(DataError::Gateway(format!("wrong month name {name} vs {month}")));
        }
    }
    Ok(())
}

/// Years of the header, consecutive from 1991, up to the first empty cell.
fn years(sheet: &Range<Data>) -> Result<Vec<i32>, DataError> {
    let mut years = Vec::new();

    for (col, expected) in (FIRST_DATA_COL..).zip(FIRST_YEAR..) {
        let text = cell_text(sheet, HEADER_ROW, col);
        if text.is_empty() {
            break;
        }
        let year = text
            .parse::<f64>()
            .map_err(|err| DataError::gateway(&format!("can't parse year {text}"), err))?;
        if year != f64::from(expected) {
            return Err(DataError::Validation(format!("wrong year {year} vs {expected}")));
        }
        years.push(expected);
    }

    Ok(years)
}

fn end_of_month(year: i32, month: u32) -> Result<DateTime<Utc>, DataError> {
    let last = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| DataError::Gateway(format!("bad CPI month {year}-{month}")))?;

    Ok(Utc.from_utc_datetime(&last.and_time(NaiveTime::MIN)))
}

/// Monthly rows in chronological order, up to the first empty cell.
pub fn parse_sheet(sheet: &Range<Data>) -> Result<Vec<Cpi>, DataError> {
    validate_months(sheet)?;

    let hundred = Decimal::ONE_HUNDRED;
    let mut rows = Vec::new();

    for (col, year) in (FIRST_DATA_COL..).zip(years(sheet)?) {
        for month in 1..=12u32 {
            let Some(value) = cell_number(sheet, FIRST_DATA_ROW + month - 1, col)? else {
                return Ok(rows);
            };
            rows.push(Cpi {
                date: end_of_month(year, month)?,
                value: value / hundred,
            });
        }
    }

    Ok(rows)
}

pub fn rule(ctx: &RuleContext) -> Result<UpdateRule<Cpi>, DataError> {
    Ok(UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<Cpi>()),
        OnUpdate::singleton(Group::Dates, Group::Cpi),
        CpiGateway::new(ctx.http.clone(), ctx.sources.cpi.clone())?,
        validators::frozen_history::<Cpi>,
        WriteMode::Replace,
        ctx.timeout,
        ctx.clock.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Three years in the header, data until March 1992.
    fn sheet() -> Range<Data> {
        let mut sheet = Range::new((0, 0), (FIRST_DATA_ROW + 11, 3));
        sheet.set_value((HEADER_ROW, 1), Data::Float(1991.0));
        sheet.set_value((HEADER_ROW, 2), Data::Float(1992.0));
        sheet.set_value((HEADER_ROW, 3), Data::String("1993".to_string()));

        for (n, month) in (0u32..).zip(MONTHS) {
            sheet.set_value((FIRST_DATA_ROW + n, 0), Data::String(month.to_string()));
            sheet.set_value((FIRST_DATA_ROW + n, 1), Data::Float(100.0 + f64::from(n)));
        }
        sheet.set_value((FIRST_DATA_ROW, 2), Data::Float(345.3));
        sheet.set_value((FIRST_DATA_ROW + 1, 2), Data::Int(138));
        sheet.set_value((FIRST_DATA_ROW + 2, 2), Data::String("129,9".to_string()));

        sheet
    }

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_until_first_empty_cell() {
        let rows = parse_sheet(&sheet()).unwrap();

        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0].date, utc(1991, 1, 31));
        assert_eq!(rows[0].value, Decimal::ONE);
        assert_eq!(rows[1].date, utc(1991, 2, 28));
        assert_eq!(rows[11].date, utc(1991, 12, 31));
        assert_eq!(rows[11].value, Decimal::new(111, 2));
        assert_eq!(rows[12].value, Decimal::new(3453, 3));
        assert_eq!(rows[13].date, utc(1992, 2, 29));
        assert_eq!(rows[13].value, Decimal::new(138, 2));
        assert_eq!(rows[14].date, utc(1992, 3, 31));
        assert_eq!(rows[14].value, Decimal::new(1299, 3));
    }

    #[test]
    fn test_wrong_month_is_rejected() {
        let mut sheet = sheet();
        sheet.set_value((FIRST_DATA_ROW + 4, 0), Data::String("мая".to_string()));

        let err = parse_sheet(&sheet).unwrap_err();
        assert!(err.to_string().contains("wrong month name"));
    }

    #[test]
    fn test_wrong_first_year_is_rejected() {
        let mut sheet = sheet();
        sheet.set_value((HEADER_ROW, 1), Data::Float(1992.0));

        assert!(matches!(parse_sheet(&sheet), Err(DataError::Validation(_))));
    }

    #[tokio::test]
    async fn test_workbook_link_is_found_on_page() {
        let server = MockServer::start().await;
        let page = format!(
            r#"<a href="{}/storage/mediabank/Ipc_mes_01-2024.xlsx">xlsx</a>
               <a href="{}/storage/mediabank/ipc_mes_02-2024.xlsx">xlsx</a>"#,
            server.uri(),
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/cpi.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let gateway = CpiGateway::new(Client::new(), format!("{}/cpi.html", server.uri())).unwrap();
        let url = gateway.workbook_url().await.unwrap();

        assert_eq!(url.path(), "/storage/mediabank/ipc_mes_02-2024.xlsx");
    }

    #[tokio::test]
    async fn test_missing_link_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let gateway = CpiGateway::new(Client::new(), server.uri()).unwrap();
        assert!(matches!(gateway.workbook_url().await, Err(DataError::Gateway(_))));
    }
}
