//! Adapters for the domain ports: storage backends and the outbound HTTP
//! clients for the payment gateway and the SMS provider.

pub mod http_gateway;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod sms;
