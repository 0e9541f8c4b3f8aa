use crate::database::payment_repository::Payment;
use crate::payments::error::PaymentResult;
use crate::payments::types::{CallbackEvent, CallbackParams, CheckoutRequest, GatewayName};

/// A hosted-checkout gateway: the donor's browser is redirected with a prepared
/// form and the gateway reports the outcome through a callback.
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> GatewayName;

    /// Build the form the browser posts to the gateway for a pending payment
    fn build_checkout(&self, payment: &Payment) -> PaymentResult<CheckoutRequest>;

    /// Reduce raw callback parameters to the transaction and its status code
    fn parse_callback(&self, params: &CallbackParams) -> PaymentResult<CallbackEvent>;
}
