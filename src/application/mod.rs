//! Application layer containing the core business logic orchestration.
//!
//! [`driver::SessionDriver`] is the entry point for menu requests. It runs the
//! pure [`menu::MenuMachine`] and hands payments to the
//! [`dispatcher::PaymentDispatcher`], a `tokio` worker queue that keeps gateway
//! latency off the USSD response path. Gateway callbacks come back through
//! [`reconciler::CallbackReconciler`].

pub mod dispatcher;
pub mod driver;
pub mod menu;
pub mod payments;
pub mod reconciler;
