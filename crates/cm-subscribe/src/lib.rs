//! Subscription decoding, parsing, merging and client-config assembly.
//! [Chinese] 订阅解码、解析、合并与客户端配置组装。
//!
//! Flow: [`decode`] -> [`classify`] -> [`share_link`] / [`parse_clash`]
//! -> [`aggregate`] -> [`assemble`]. Network download lives behind the
//! `subs_http` feature.
pub mod aggregate;
pub mod assemble;
pub mod classify;
pub mod decode;
#[cfg(feature = "subs_http")]
pub mod http;
pub mod model;
pub mod parse_clash;
pub mod rules;
pub mod share_link;

pub use aggregate::{merge_sources, parse_source, Aggregate, Aggregator, FetchedSource, MergeReport};
pub use assemble::{ConfigAssembler, MergedDocument};
pub use model::{ProtocolType, ProxyRecord, SubsError};
