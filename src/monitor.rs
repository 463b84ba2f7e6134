use crate::alert::{AlertDispatcher, AlertEvent, WebhookSender};
use crate::amount::{DisplayAmount, format_amount};
use crate::config::Config;
use crate::error::ReadError;
use crate::ledger::{LedgerReader, TokenMetadata};
use crate::rpc::ContractCaller;
use alloy_primitives::Address;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub token: Address,
    pub account: Address,
    pub alias: String,
    pub threshold: f64,
    pub precision: usize,
    pub interval: Duration,
    pub mute: bool,
    pub at_all: bool,
    pub at_mobiles: Vec<String>,
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            token: config.token_address,
            account: config.account_address,
            alias: config.account_alias.clone(),
            threshold: config.threshold,
            precision: config.precision,
            interval: config.interval,
            mute: config.mute,
            at_all: config.at_all,
            at_mobiles: config.at_mobiles.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Stopped,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The balance read failed; nothing else happened.
    Skipped,
    BelowThreshold(DisplayAmount),
    /// Threshold reached but notifications are muted.
    Muted(DisplayAmount),
    Alerted {
        amount: DisplayAmount,
        delivered: bool,
    },
}

/// Polls one account's balance and alerts while it is at or above the threshold.
///
/// Every tick that meets the threshold sends its own alert; there is no
/// suppression between consecutive ticks.
pub struct Monitor<C, W> {
    reader: LedgerReader<C>,
    dispatcher: AlertDispatcher<W>,
    settings: MonitorSettings,
    state: MonitorState,
}

impl<C: ContractCaller, W: WebhookSender> Monitor<C, W> {
    /// Fetches token metadata and returns a running monitor. Any failure here
    /// is fatal: amounts cannot be formatted without the token's decimals.
    pub async fn start(
        reader: LedgerReader<C>,
        dispatcher: AlertDispatcher<W>,
        settings: MonitorSettings,
    ) -> Result<Self, ReadError> {
        let metadata = reader.fetch_metadata(settings.token).await?;

        info!(
            decimals = metadata.decimals,
            symbol = %metadata.symbol,
            token = ?settings.token,
            account = ?settings.account,
            alias = %settings.alias,
            "start monitor erc20 balance info"
        );

        Ok(Self {
            reader,
            dispatcher,
            settings,
            state: MonitorState::Running,
        })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Token metadata cached by the reader at startup.
    pub fn metadata(&self) -> Option<&TokenMetadata> {
        self.reader.metadata()
    }

    pub async fn tick(&self) -> TickOutcome {
        let Some(metadata) = self.reader.metadata() else {
            warn!("Token metadata not loaded, skipping tick");
            return TickOutcome::Skipped;
        };

        let raw = match self
            .reader
            .fetch_balance(self.settings.token, self.settings.account)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Balance read failed, skipping tick: {}", e);
                return TickOutcome::Skipped;
            }
        };

        let amount = format_amount(raw, metadata.decimals, self.settings.precision);
        info!("bal info: {}{}", amount.text, metadata.symbol);

        if amount.approx < self.settings.threshold {
            return TickOutcome::BelowThreshold(amount);
        }
        if self.settings.mute {
            return TickOutcome::Muted(amount);
        }

        let event = AlertEvent::threshold_crossed(
            &self.settings.alias,
            &metadata.symbol,
            &amount.text,
            self.settings.threshold,
            self.settings.at_all,
            &self.settings.at_mobiles,
        );
        let delivered = self.dispatcher.send(&event).await;
        TickOutcome::Alerted { amount, delivered }
    }

    /// Ticks every `interval` until `shutdown` fires and returns the number of
    /// completed ticks. A tick in flight when shutdown fires is abandoned.
    pub async fn run(&mut self, shutdown: CancellationToken) -> u64 {
        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = self.tick() => ticks += 1,
                    }
                }
            }
        }

        self.state = MonitorState::Stopped;
        info!("process exit after {} tick(s)", ticks);
        ticks
    }
}
