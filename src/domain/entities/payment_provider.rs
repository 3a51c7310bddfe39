use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Payment gateway a transaction was initiated with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "payment_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PaymentProvider {
    /// Card payments via hosted Checkout Sessions
    Stripe,
    /// Card and mobile money via hosted payment links
    Flutterwave,
    /// Local simulation, never enabled in production
    Dummy,
}

impl PaymentProvider {
    /// Human-readable display name for the provider
    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "Stripe",
            PaymentProvider::Flutterwave => "Flutterwave",
            PaymentProvider::Dummy => "Test Provider",
        }
    }

    /// Whether checkout redirects the subscriber to a page hosted by the provider
    pub fn requires_external_checkout(&self) -> bool {
        matches!(self, PaymentProvider::Stripe | PaymentProvider::Flutterwave)
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, PaymentProvider::Dummy)
    }

    /// Hosted payment links are only issued against a customer email
    pub fn requires_customer_email(&self) -> bool {
        matches!(self, PaymentProvider::Flutterwave)
    }

    /// Request header carrying the webhook signature
    pub fn signature_header(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe-signature",
            PaymentProvider::Flutterwave => "verif-hash",
            PaymentProvider::Dummy => "x-dummy-signature",
        }
    }

    pub fn all() -> &'static [PaymentProvider] {
        &[
            PaymentProvider::Stripe,
            PaymentProvider::Flutterwave,
            PaymentProvider::Dummy,
        ]
    }
}
