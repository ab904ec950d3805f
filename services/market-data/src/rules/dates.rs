//! Trading dates
//!
//! Triggered by the end of a trading day. Downloads the interval of dates
//! with published results and replaces the singleton `dates` table.

use std::sync::Arc;

use async_trait::async_trait;
use types::dates::TradingDate;
use types::errors::DataError;
use types::ids::Group;
use types::table::Table;

use super::RuleContext;
use crate::clients::IssClient;
use crate::ports::{Gateway, OnUpdate};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "DatesRule";

pub struct DatesGateway {
    iss: IssClient,
}

impl DatesGateway {
    pub fn new(iss: IssClient) -> Self {
        Self { iss }
    }
}

#[async_trait]
impl Gateway<TradingDate> for DatesGateway {
    async fn get(&self, _table: &Table<TradingDate>) -> Result<Vec<TradingDate>, DataError> {
        self.iss.market_dates().await
    }
}

pub fn rule(ctx: &RuleContext) -> UpdateRule<TradingDate> {
    UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<TradingDate>()),
        OnUpdate::singleton(Group::DayEnded, Group::Dates),
        DatesGateway::new(ctx.iss()),
        validators::single_row::<TradingDate>,
        WriteMode::Replace,
        ctx.timeout,
        ctx.clock.clone(),
    )
}
