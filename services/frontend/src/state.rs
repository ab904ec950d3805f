use std::sync::Arc;
use std::time::Duration;

use market_data::{Clock, TradingCalendar};
use persistence::{DocumentStore, JsonRepo, JsonView};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::editors::{Announce, DividendEditor, PortfolioEditor};

#[derive(Clone)]
pub struct AppState {
    pub tables: Arc<dyn JsonView>,
    pub dividends: Arc<DividendEditor>,
    pub portfolio: Arc<PortfolioEditor>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        calendar: TradingCalendar,
        announce: Arc<dyn Announce>,
    ) -> Self {
        Self {
            tables: Arc::new(JsonRepo::new(Arc::clone(&store))),
            dividends: Arc::new(DividendEditor::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                calendar,
                Arc::clone(&announce),
            )),
            portfolio: Arc::new(PortfolioEditor::new(store, clock, announce)),
        }
    }

    /// Drop expired editor sessions every `period` until shutdown.
    pub async fn sweep_sessions(self, period: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let dropped = self.dividends.sweep() + self.portfolio.sweep();
                    if dropped > 0 {
                        debug!(dropped, "expired sessions dropped");
                    }
                }
            }
        }
    }
}
