use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::error::DatabaseError;
use crate::database::payment_repository::Payment;
use crate::database::repository::{Finalization, PaymentStore};
use crate::logging::mask_email;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{CallbackParams, PaymentStatus};
use crate::services::notification::{Notifier, ReceiptRenderer};

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Missing transaction id")]
    MissingTransactionId,
    #[error("Transaction not found: {0}")]
    NotFound(String),
    #[error("Transaction {transaction_id} is already {stored}; callback reported {reported}")]
    Conflict {
        transaction_id: String,
        stored: PaymentStatus,
        reported: PaymentStatus,
    },
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// What the donor's browser should be shown after a callback
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    Succeeded {
        payment: Payment,
        /// The payment was already `Success` before this callback
        replay: bool,
    },
    Failed {
        payment: Payment,
        status_code: Option<String>,
        replay: bool,
    },
}

impl CallbackOutcome {
    pub fn is_replay(&self) -> bool {
        match self {
            CallbackOutcome::Succeeded { replay, .. } | CallbackOutcome::Failed { replay, .. } => {
                *replay
            }
        }
    }
}

/// Reconciles gateway callbacks against stored payments
pub struct CallbackProcessor {
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    renderer: ReceiptRenderer,
}

impl CallbackProcessor {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        renderer: ReceiptRenderer,
    ) -> Self {
        Self {
            payments,
            gateway,
            notifier,
            renderer,
        }
    }

    pub async fn process_callback(
        &self,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome, CallbackError> {
        let event = self.gateway.parse_callback(params).map_err(|e| {
            warn!(gateway = %self.gateway.name(), error = %e, "Callback without transaction id");
            CallbackError::MissingTransactionId
        })?;

        let target = event.target_status();
        let tx_id = event.transaction_id.as_str();
        info!(
            transaction_id = %tx_id,
            status_code = ?event.status_code,
            target_status = %target,
            "Processing gateway callback"
        );

        let finalization = self
            .payments
            .finalize(tx_id, target)
            .await?
            .ok_or_else(|| {
                warn!(transaction_id = %tx_id, "Callback for unknown transaction");
                CallbackError::NotFound(tx_id.to_string())
            })?;

        match finalization {
            Finalization::Applied(payment) => {
                info!(
                    transaction_id = %payment.transaction_id,
                    status = %payment.status,
                    amount = %payment.amount,
                    "Payment finalized"
                );
                if payment.status == PaymentStatus::Success {
                    self.send_receipt(&payment).await;
                }
                Ok(Self::outcome(payment, event.status_code, false))
            }
            Finalization::AlreadyFinal(payment) if payment.status == target => {
                info!(
                    transaction_id = %payment.transaction_id,
                    status = %payment.status,
                    "Callback replay, payment already finalized"
                );
                Ok(Self::outcome(payment, event.status_code, true))
            }
            Finalization::AlreadyFinal(payment) => {
                warn!(
                    transaction_id = %payment.transaction_id,
                    stored = %payment.status,
                    reported = %target,
                    status_code = ?event.status_code,
                    "Callback contradicts finalized payment"
                );
                Err(CallbackError::Conflict {
                    transaction_id: payment.transaction_id,
                    stored: payment.status,
                    reported: target,
                })
            }
        }
    }

    fn outcome(payment: Payment, status_code: Option<String>, replay: bool) -> CallbackOutcome {
        match payment.status {
            PaymentStatus::Success => CallbackOutcome::Succeeded { payment, replay },
            _ => CallbackOutcome::Failed {
                payment,
                status_code,
                replay,
            },
        }
    }

    /// Delivery failures are logged only; the payment stays `Success`.
    async fn send_receipt(&self, payment: &Payment) {
        let receipt = self.renderer.render(payment, Utc::now());
        if let Err(e) = self.notifier.send_receipt(&receipt).await {
            error!(
                transaction_id = %payment.transaction_id,
                to = %mask_email(&payment.email),
                error = %e,
                "Donation receipt could not be sent"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationConfig;
    use crate::database::memory::InMemoryPaymentStore;
    use crate::database::payment_repository::NewPayment;
    use crate::payments::error::{PaymentError, PaymentResult};
    use crate::payments::types::{CallbackEvent, CheckoutRequest, GatewayName};
    use crate::services::notification::{NotificationError, Receipt};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    struct PassthroughGateway;

    impl PaymentGateway for PassthroughGateway {
        fn name(&self) -> GatewayName {
            GatewayName::WebXPay
        }

        fn build_checkout(&self, _payment: &Payment) -> PaymentResult<CheckoutRequest> {
            unreachable!("not used by callback processing")
        }

        fn parse_callback(&self, params: &CallbackParams) -> PaymentResult<CallbackEvent> {
            let transaction_id = params
                .order_id
                .clone()
                .or_else(|| params.callback_id.clone())
                .ok_or(PaymentError::ValidationError {
                    message: "missing".to_string(),
                    field: Some("order_id".to_string()),
                })?;
            Ok(CallbackEvent {
                transaction_id,
                status_code: params.status_code.clone(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Receipt>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotificationError> {
            self.sent.lock().await.push(receipt.clone());
            if self.fail {
                return Err(NotificationError::Transport("smtp down".to_string()));
            }
            Ok(())
        }
    }

    async fn setup(fail_email: bool) -> (CallbackProcessor, Arc<InMemoryPaymentStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(InMemoryPaymentStore::new());
        store
            .create(NewPayment {
                transaction_id: "0b9c2d4e-1111-4a2b-9c3d-5e6f7a8b9c0d".to_string(),
                first_name: "Ayesha".to_string(),
                last_name: "Nazeer".to_string(),
                email: "ayesha@example.com".to_string(),
                phone: "0771234567".to_string(),
                address_line_one: String::new(),
                address_line_two: String::new(),
                city: String::new(),
                state: String::new(),
                postal_code: String::new(),
                country: "Sri Lanka".to_string(),
                donation_option: "Zakat".to_string(),
                donate_to: "General".to_string(),
                message: String::new(),
                amount: dec!(3084.50),
            })
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier {
            fail: fail_email,
            ..Default::default()
        });
        let processor = CallbackProcessor::new(
            store.clone(),
            Arc::new(PassthroughGateway),
            notifier.clone(),
            ReceiptRenderer::new(NotificationConfig::default(), "LKR"),
        );
        (processor, store, notifier)
    }

    fn callback(id: &str, code: Option<&str>) -> CallbackParams {
        CallbackParams {
            order_id: Some(id.to_string()),
            callback_id: None,
            status_code: code.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn success_callback_finalizes_and_sends_one_receipt() {
        let (processor, store, notifier) = setup(false).await;

        let outcome = processor
            .process_callback(&callback("0B9C2D4E-1111-4A2B-9C3D-5E6F7A8B9C0D", Some("00")))
            .await
            .unwrap();
        assert!(matches!(outcome, CallbackOutcome::Succeeded { replay: false, .. }));

        let replay = processor
            .process_callback(&callback("0b9c2d4e-1111-4a2b-9c3d-5e6f7a8b9c0d", Some("00")))
            .await
            .unwrap();
        assert!(replay.is_replay());

        assert_eq!(notifier.sent.lock().await.len(), 1);
        let stored = store
            .find_by_transaction_id("0b9c2d4e-1111-4a2b-9c3d-5e6f7a8b9c0d")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn failure_code_marks_failed_without_email() {
        let (processor, store, notifier) = setup(false).await;

        let outcome = processor
            .process_callback(&callback("0b9c2d4e-1111-4a2b-9c3d-5e6f7a8b9c0d", Some("05")))
            .await
            .unwrap();
        match outcome {
            CallbackOutcome::Failed {
                status_code,
                replay,
                ..
            } => {
                assert_eq!(status_code.as_deref(), Some("05"));
                assert!(!replay);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(notifier.sent.lock().await.is_empty());
        assert_eq!(store.count_failed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn contradicting_callback_is_a_conflict() {
        let (processor, store, notifier) = setup(false).await;
        let id = "0b9c2d4e-1111-4a2b-9c3d-5e6f7a8b9c0d";

        processor
            .process_callback(&callback(id, Some("00")))
            .await
            .unwrap();
        let err = processor
            .process_callback(&callback(id, Some("51")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CallbackError::Conflict {
                stored: PaymentStatus::Success,
                reported: PaymentStatus::Failed,
                ..
            }
        ));
        assert_eq!(store.count_failed().await.unwrap(), 0);
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn late_success_recovers_failed_payment_and_sends_receipt() {
        let (processor, store, notifier) = setup(false).await;
        let id = "0b9c2d4e-1111-4a2b-9c3d-5e6f7a8b9c0d";

        processor
            .process_callback(&callback(id, Some("05")))
            .await
            .unwrap();
        assert!(notifier.sent.lock().await.is_empty());

        let outcome = processor
            .process_callback(&callback(id, Some("00")))
            .await
            .unwrap();
        assert!(matches!(outcome, CallbackOutcome::Succeeded { replay: false, .. }));
        assert_eq!(
            store.find_by_transaction_id(id).await.unwrap().unwrap().status,
            PaymentStatus::Success
        );
        assert_eq!(notifier.sent.lock().await.len(), 1);

        let replay = processor
            .process_callback(&callback(id, Some("00")))
            .await
            .unwrap();
        assert!(replay.is_replay());
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn padded_success_code_is_a_failure() {
        let (processor, store, notifier) = setup(false).await;
        let id = "0b9c2d4e-1111-4a2b-9c3d-5e6f7a8b9c0d";

        let outcome = processor
            .process_callback(&callback(id, Some(" 00 ")))
            .await
            .unwrap();
        assert!(matches!(outcome, CallbackOutcome::Failed { .. }));
        assert_eq!(
            store.find_by_transaction_id(id).await.unwrap().unwrap().status,
            PaymentStatus::Failed
        );
        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_missing_ids_are_rejected() {
        let (processor, _store, _notifier) = setup(false).await;

        let err = processor
            .process_callback(&callback("does-not-exist", Some("00")))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::NotFound(_)));

        let err = processor
            .process_callback(&CallbackParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::MissingTransactionId));
    }

    #[tokio::test]
    async fn email_failure_does_not_roll_back_success() {
        let (processor, store, notifier) = setup(true).await;
        let id = "0b9c2d4e-1111-4a2b-9c3d-5e6f7a8b9c0d";

        let outcome = processor
            .process_callback(&callback(id, Some("00")))
            .await
            .unwrap();
        assert!(matches!(outcome, CallbackOutcome::Succeeded { .. }));
        assert_eq!(notifier.sent.lock().await.len(), 1);
        assert_eq!(
            store.find_by_transaction_id(id).await.unwrap().unwrap().status,
            PaymentStatus::Success
        );
    }
}
