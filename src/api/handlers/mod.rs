pub mod admin;
pub mod checkout;
pub mod root;
pub mod wallet;
pub mod webhooks;
