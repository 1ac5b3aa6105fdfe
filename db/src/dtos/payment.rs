use uuid::Uuid;

use crate::models::payment::PaymentStatus;

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_invoice_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
}
