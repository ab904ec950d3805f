//! Addresses of external data sources

use serde::Deserialize;

use crate::clients::iss::DEFAULT_ISS_URL;
use crate::clients::telegram::DEFAULT_TELEGRAM_URL;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Sources {
    /// MOEX ISS base URL.
    pub iss: String,
    /// MOEX CSV with dividend record dates.
    pub moex_csv: String,
    /// NASDAQ API base URL.
    pub nasdaq: String,
    /// Registry closing dates site.
    pub reestry: String,
    /// Rosstat page linking the CPI workbook.
    pub cpi: String,
    /// Telegram Bot API base URL.
    pub telegram: String,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            iss: DEFAULT_ISS_URL.to_string(),
            moex_csv: "https://www.moex.com/ru/listing/listing-register-closing-csv.aspx".to_string(),
            nasdaq: "https://api.nasdaq.com".to_string(),
            reestry: "https://закрытияреестров.рф".to_string(),
            cpi: "https://rosstat.gov.ru/storage/mediabank/ind_potreb_cen_02.html".to_string(),
            telegram: DEFAULT_TELEGRAM_URL.to_string(),
        }
    }
}
