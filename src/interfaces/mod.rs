//! Inbound adapters: the HTTP API the USSD and payment gateways call, and the
//! CSV reader used to seed the candidate directory.

pub mod csv {
    pub mod candidate_reader;
}
pub mod http;
