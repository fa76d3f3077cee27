//! End-to-end tests of the payment saga: all three participants running on
//! one in-memory log.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::IdempotencyKey;
use domain::{
    InMemoryPaymentRepository, Payment, PaymentEvent, PaymentRepository, PaymentRequest,
    PaymentStatus, Version, WireFormat,
};
use event_log::{
    ConnectionBehaviour, EventProducer, FaultPlan, InMemoryEventLog, Offset, TopicPartition,
};
use saga::{
    ConsumerLoop, ConsumerOptions, ConsumerStats, EventPublisher, InMemoryAccountService,
    InMemoryPaymentGateway, Ledger, PaymentProvider, PaymentService,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const TOPIC: &str = "payments";
const GROUPS: [&str; 3] = ["ledger", "payment-provider", "payment-service"];

type Service = PaymentService<InMemoryEventLog, InMemoryPaymentRepository>;

struct TestSaga {
    log: InMemoryEventLog,
    repository: InMemoryPaymentRepository,
    accounts: InMemoryAccountService,
    gateway: InMemoryPaymentGateway,
    service: Arc<Service>,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<saga::Result<ConsumerStats>>>,
}

impl TestSaga {
    fn start() -> Self {
        Self::start_with(
            InMemoryEventLog::new(),
            InMemoryAccountService::new(),
            InMemoryPaymentGateway::new(),
        )
    }

    fn start_with(
        log: InMemoryEventLog,
        accounts: InMemoryAccountService,
        gateway: InMemoryPaymentGateway,
    ) -> Self {
        let repository = InMemoryPaymentRepository::new();
        let publisher = || EventPublisher::new(log.clone(), TOPIC);
        let options = ConsumerOptions::new(TOPIC)
            .with_poll_timeout(Duration::from_millis(20))
            .with_retry_backoff(Duration::from_millis(5));
        let (shutdown, rx) = watch::channel(false);

        let ledger = Ledger::new(publisher(), accounts.clone());
        let provider = PaymentProvider::new(publisher(), gateway.clone());
        let service = Arc::new(PaymentService::new(publisher(), repository.clone()));

        let handles = vec![
            tokio::spawn(
                ConsumerLoop::new(log.consumer("ledger"), ledger, options.clone()).run(rx.clone()),
            ),
            tokio::spawn(
                ConsumerLoop::new(log.consumer("payment-provider"), provider, options.clone())
                    .run(rx.clone()),
            ),
            tokio::spawn(
                ConsumerLoop::new(log.consumer("payment-service"), Arc::clone(&service), options)
                    .run(rx),
            ),
        ];

        Self {
            log,
            repository,
            accounts,
            gateway,
            service,
            shutdown,
            handles,
        }
    }

    async fn request(&self, key: &str, amount: i64) {
        self.service
            .create_payment(PaymentRequest::new(key, amount))
            .await
            .unwrap();
    }

    async fn wait_until_paid(&self, key: &str) -> Payment {
        let key = IdempotencyKey::from(key);
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(payment) = self.repository.get(&key).await.unwrap() {
                    if payment.is_paid() {
                        return payment;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("payment not completed in time")
    }

    /// Waits until every group has committed every record on the topic.
    async fn wait_until_settled(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.settled().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("saga did not settle in time");
    }

    async fn settled(&self) -> bool {
        let mut ends: HashMap<u32, u64> = HashMap::new();
        for record in self.log.records(TOPIC).await {
            ends.insert(record.partition, record.offset.as_u64() + 1);
        }
        for (partition, end) in ends {
            let tp = TopicPartition::new(TOPIC, partition);
            for group in GROUPS {
                if self.log.committed_offset(group, &tp).await != Some(Offset::new(end)) {
                    return false;
                }
            }
        }
        true
    }

    async fn events_for(&self, key: &str) -> Vec<PaymentEvent> {
        self.log
            .records_for_key(TOPIC, &IdempotencyKey::from(key))
            .await
            .iter()
            .map(|r| PaymentEvent::decode(&r.payload).unwrap())
            .collect()
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        for handle in self.handles {
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .expect("consumer loop did not stop in time")
                .unwrap()
                .unwrap();
        }
    }
}

fn count(events: &[PaymentEvent], event_type: &str) -> usize {
    events
        .iter()
        .filter(|e| e.event_type() == event_type)
        .count()
}

#[tokio::test]
async fn test_happy_path_payment_completes() {
    let saga = TestSaga::start();

    saga.request("abc", 100).await;
    let payment = saga.wait_until_paid("abc").await;
    saga.wait_until_settled().await;

    assert_eq!(
        payment,
        Payment {
            key: IdempotencyKey::from("abc"),
            amount: 100,
            status: PaymentStatus::Paid,
            version: Version::new(1),
        }
    );
    assert_eq!(
        saga.events_for("abc").await,
        vec![
            PaymentEvent::payment_requested(100),
            PaymentEvent::account_debited(1, 100),
            PaymentEvent::pay_requested(100),
            PaymentEvent::pay_confirmed(100),
        ]
    );
    assert_eq!(saga.accounts.debit_count().await, 1);
    assert_eq!(saga.gateway.payment_count().await, 1);

    saga.stop().await;
}

#[tokio::test]
async fn test_duplicate_pay_confirmed_keeps_version() {
    let saga = TestSaga::start();
    saga.request("abc", 100).await;
    saga.wait_until_paid("abc").await;

    for _ in 0..2 {
        saga.log
            .publish(
                TOPIC,
                &IdempotencyKey::from("abc"),
                PaymentEvent::pay_confirmed(100).encode(WireFormat::Colon).unwrap(),
            )
            .await
            .unwrap();
    }
    saga.wait_until_settled().await;

    let payment = saga.service.get_payment(&"abc".into()).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.version, Version::new(1));

    saga.stop().await;
}

#[tokio::test]
async fn test_repeated_request_for_paid_payment_is_noop() {
    let saga = TestSaga::start();
    saga.request("abc", 100).await;
    saga.wait_until_paid("abc").await;
    saga.wait_until_settled().await;

    saga.request("abc", 100).await;
    saga.wait_until_settled().await;

    assert_eq!(saga.events_for("abc").await.len(), 4);
    assert_eq!(saga.accounts.debit_count().await, 1);

    saga.stop().await;
}

#[tokio::test]
async fn test_ledger_failure_is_retried_once() {
    let faults = FaultPlan::new();
    faults.script_key("xyz", [ConnectionBehaviour::FailBefore]);
    let accounts = InMemoryAccountService::new().with_faults(faults.clone());
    let saga = TestSaga::start_with(
        InMemoryEventLog::new(),
        accounts,
        InMemoryPaymentGateway::new(),
    );

    saga.request("xyz", 100).await;
    let payment = saga.wait_until_paid("xyz").await;
    saga.wait_until_settled().await;

    let events = saga.events_for("xyz").await;
    assert_eq!(count(&events, "AccountDebited"), 1);
    assert_eq!(payment.version, Version::new(1));
    assert_eq!(saga.accounts.debit_count().await, 1);
    assert_eq!(saga.accounts.call_count(), 1);
    assert_eq!(faults.remaining(), 0);

    saga.stop().await;
}

#[tokio::test]
async fn test_lost_debit_acknowledgement_debits_once() {
    let faults = FaultPlan::new();
    faults.script_key("xyz", [ConnectionBehaviour::FailAfter]);
    let accounts = InMemoryAccountService::new().with_faults(faults);
    let saga = TestSaga::start_with(
        InMemoryEventLog::new(),
        accounts,
        InMemoryPaymentGateway::new(),
    );

    saga.request("xyz", 100).await;
    saga.wait_until_paid("xyz").await;
    saga.wait_until_settled().await;

    let events = saga.events_for("xyz").await;
    assert_eq!(count(&events, "AccountDebited"), 1);
    assert_eq!(saga.accounts.debit_count().await, 1);
    assert_eq!(saga.accounts.call_count(), 2);

    saga.stop().await;
}

#[tokio::test]
async fn test_ambiguous_publish_produces_duplicates_but_one_effect() {
    let publish_faults = FaultPlan::new();
    publish_faults.script_key("abc", [ConnectionBehaviour::FailAfter]);
    let log = InMemoryEventLog::new().with_publish_faults(publish_faults);
    let saga = TestSaga::start_with(
        log,
        InMemoryAccountService::new(),
        InMemoryPaymentGateway::new(),
    );

    // The first request's publish lands but reports failure; the caller retries.
    let first = saga
        .service
        .create_payment(PaymentRequest::new("abc", 100))
        .await;
    assert!(first.is_err());
    saga.request("abc", 100).await;

    let payment = saga.wait_until_paid("abc").await;
    saga.wait_until_settled().await;

    let events = saga.events_for("abc").await;
    // The retry republishes unless the saga already finished in between.
    assert!((1..=2).contains(&count(&events, "PaymentRequested")));
    assert_eq!(events[0], PaymentEvent::payment_requested(100));
    assert!(count(&events, "PayConfirmed") >= 1);
    assert_eq!(payment.version, Version::new(1));
    assert_eq!(saga.accounts.debit_count().await, 1);
    assert_eq!(saga.gateway.payment_count().await, 1);

    saga.stop().await;
}

#[tokio::test]
async fn test_many_payments_complete() {
    let saga = TestSaga::start();
    let keys: Vec<String> = (0..20).map(|i| format!("payment-{i}")).collect();

    for (i, key) in keys.iter().enumerate() {
        saga.request(key, 10 * (i as i64 + 1)).await;
    }
    for key in &keys {
        saga.wait_until_paid(key).await;
    }
    saga.wait_until_settled().await;

    let payments = saga.service.payments().await.unwrap();
    assert_eq!(payments.len(), 20);
    assert!(payments.iter().all(|p| p.is_paid() && p.version == Version::new(1)));
    assert_eq!(saga.accounts.debit_count().await, 20);
    assert_eq!(saga.gateway.payment_count().await, 20);

    saga.stop().await;
}
