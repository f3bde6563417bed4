//! External API integrations

pub mod mail_relay;
pub mod payment_gateway;

pub use mail_relay::{MailRelayClient, OutgoingMail};
pub use payment_gateway::PaymentGatewayClient;
