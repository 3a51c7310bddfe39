pub mod payment_provider;
