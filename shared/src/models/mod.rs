//! Domain models for the shop platform

mod audit;
mod cart;
mod delivery;
mod order;
mod payment;
mod prediction;
mod product;
mod report;
mod returns;
mod user;
mod wallet;
mod warranty;

pub use audit::*;
pub use cart::*;
pub use delivery::*;
pub use order::*;
pub use payment::*;
pub use prediction::*;
pub use product::*;
pub use report::*;
pub use returns::*;
pub use user::*;
pub use wallet::*;
pub use warranty::*;
