//! Domain layer: session and ledger entities, payment wire types and the ports
//! the application layer talks through.

pub mod candidate;
pub mod ledger;
pub mod money;
pub mod network;
pub mod payment;
pub mod ports;
pub mod session;
pub mod ussd;
