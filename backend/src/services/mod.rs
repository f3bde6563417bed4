//! Business logic services for the shop platform

pub mod audit;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod delivery;
pub mod notification;
pub mod order;
pub mod payment;
pub mod prediction;
pub mod reporting;
pub mod returns;
pub mod user;
pub mod wallet;
pub mod warranty;

pub use audit::AuditService;
pub use auth::AuthService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use delivery::DeliveryService;
pub use notification::ReturnNotifier;
pub use order::OrderService;
pub use payment::PaymentService;
pub use prediction::PredictionService;
pub use reporting::ReportingService;
pub use returns::ReturnService;
pub use user::UserService;
pub use wallet::WalletService;
pub use warranty::WarrantyService;
