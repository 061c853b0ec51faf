//! Types shared by every `badcapt` crate: the decoded packet view, tags,
//! export records and the runtime configuration.

pub mod config;
pub mod packet;
pub mod record;
pub mod tag;
