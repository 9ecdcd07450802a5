pub mod order;
pub mod payment;
pub mod commission;
pub mod wallet;

pub use order::*;
pub use payment::*;
pub use commission::*;
pub use wallet::*;
