//! Payment saga runtime.
//!
//! Wires the in-memory log, the payment store, the external service stubs
//! and the three saga participants together, one consumer loop per
//! participant, and provides the configuration and telemetry setup used by
//! the `payment-saga` binary.

pub mod config;
pub mod error;
pub mod telemetry;

use std::sync::Arc;

use common::IdempotencyKey;
use domain::{InMemoryPaymentRepository, Payment, PaymentRequest, PaymentResponse};
use event_log::InMemoryEventLog;
use saga::{
    ConsumerLoop, ConsumerOptions, ConsumerStats, DebitRequest, DebitResponse, EventPublisher,
    InMemoryAccountService, InMemoryPaymentGateway, Ledger, Participant, PayRequest, PayResponse,
    PaymentProvider, PaymentService,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use config::{Config, LogFormat};
pub use error::{AppError, Result};

type Payments = PaymentService<InMemoryEventLog, InMemoryPaymentRepository>;
type LoopHandle = JoinHandle<saga::Result<ConsumerStats>>;

/// Snapshot of everything the runtime has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dump {
    /// Debits executed by the account service, ordered by key.
    pub debits: Vec<(DebitRequest, DebitResponse)>,
    /// Transfers executed by the payment gateway, ordered by key.
    pub transfers: Vec<(PayRequest, PayResponse)>,
    /// Stored payments, ordered by key.
    pub payments: Vec<Payment>,
}

/// A running payment saga.
pub struct App {
    config: Config,
    log: InMemoryEventLog,
    accounts: InMemoryAccountService,
    gateway: InMemoryPaymentGateway,
    payments: Arc<Payments>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, LoopHandle)>,
}

impl App {
    /// Starts every participant with in-memory external services.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: Config) -> Self {
        Self::start_with(
            config,
            InMemoryAccountService::new(),
            InMemoryPaymentGateway::new(),
        )
    }

    /// Starts every participant using the given external services.
    pub fn start_with(
        config: Config,
        accounts: InMemoryAccountService,
        gateway: InMemoryPaymentGateway,
    ) -> Self {
        let log = InMemoryEventLog::new()
            .with_partitions(config.partitions)
            .with_max_poll_records(config.max_poll_records);
        let publisher =
            || EventPublisher::new(log.clone(), config.topic.clone()).with_format(config.wire_format);
        let options = ConsumerOptions::new(config.topic.clone())
            .with_poll_timeout(config.poll_timeout)
            .with_retry_backoff(config.retry_backoff);
        let (shutdown, rx) = watch::channel(false);

        let payments = Arc::new(PaymentService::new(
            publisher(),
            InMemoryPaymentRepository::new(),
        ));
        let tasks = vec![
            spawn_loop(
                &log,
                Ledger::new(publisher(), accounts.clone()),
                options.clone(),
                rx.clone(),
            ),
            spawn_loop(
                &log,
                PaymentProvider::new(publisher(), gateway.clone()),
                options.clone(),
                rx.clone(),
            ),
            spawn_loop(&log, Arc::clone(&payments), options, rx),
        ];

        tracing::info!(
            bootstrap_servers = %config.bootstrap_servers,
            topic = %config.topic,
            partitions = config.partitions,
            wire_format = %config.wire_format,
            "payment saga started"
        );

        Self {
            config,
            log,
            accounts,
            gateway,
            payments,
            shutdown,
            tasks,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the log the participants communicate through.
    pub fn log(&self) -> &InMemoryEventLog {
        &self.log
    }

    /// Requests a payment. Repeating the call with the same key is safe.
    pub async fn request_payment(
        &self,
        key: impl Into<IdempotencyKey>,
        amount: i64,
    ) -> Result<PaymentResponse> {
        Ok(self
            .payments
            .create_payment(PaymentRequest::new(key, amount))
            .await?)
    }

    /// Returns the stored payment for `key`.
    pub async fn payment(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        Ok(self.payments.get_payment(key).await?)
    }

    /// Requests `payment_count` payments, each `payment_repeat` times with
    /// the same key, pausing `payment_interval` after every request.
    pub async fn run_cadence(&self) -> Result<Vec<PaymentResponse>> {
        let mut responses = Vec::new();
        for _ in 0..self.config.payment_count {
            let key = IdempotencyKey::new();
            for attempt in 1..=self.config.payment_repeat {
                tracing::info!(%key, attempt, amount = self.config.payment_amount, "requesting payment");
                responses.push(
                    self.request_payment(key.clone(), self.config.payment_amount)
                        .await?,
                );
                tokio::time::sleep(self.config.payment_interval).await;
            }
        }
        Ok(responses)
    }

    /// Logs and returns the executed external requests and the stored
    /// payments.
    pub async fn dump(&self) -> Result<Dump> {
        let mut debits = self.accounts.executed().await;
        debits.sort_by(|a, b| a.0.idempotency_key.cmp(&b.0.idempotency_key));
        let mut transfers = self.gateway.executed().await;
        transfers.sort_by(|a, b| a.0.idempotency_key.cmp(&b.0.idempotency_key));
        let payments = self.payments.payments().await?;

        for (request, response) in &debits {
            tracing::info!(service = "ledger", ?request, ?response, "executed request");
        }
        for (request, response) in &transfers {
            tracing::info!(service = "payment-gateway", ?request, ?response, "executed request");
        }
        for payment in &payments {
            tracing::info!(%payment, "stored payment");
        }

        Ok(Dump {
            debits,
            transfers,
            payments,
        })
    }

    /// Stops every consumer loop and waits for them to finish.
    ///
    /// Handlers in flight complete first.
    pub async fn shutdown(self) -> Result<Vec<(&'static str, ConsumerStats)>> {
        tracing::info!("stopping consumer loops");
        self.shutdown.send_replace(true);

        let mut stats = Vec::with_capacity(self.tasks.len());
        for (name, handle) in self.tasks {
            let finished = handle.await.map_err(|e| AppError::Task {
                name,
                reason: e.to_string(),
            })??;
            stats.push((name, finished));
        }
        Ok(stats)
    }
}

/// Spawns the consumer loop of `participant`, which consumes as the group
/// named after it.
fn spawn_loop<H>(
    log: &InMemoryEventLog,
    participant: H,
    options: ConsumerOptions,
    shutdown: watch::Receiver<bool>,
) -> (&'static str, LoopHandle)
where
    H: Participant + 'static,
{
    let name = participant.name();
    let consumer_loop = ConsumerLoop::new(log.consumer(name), participant, options);
    (name, tokio::spawn(consumer_loop.run(shutdown)))
}
