//! clash-merge application crate.
//! [Chinese] 应用层：命令行、日志、订阅列表与运行编排；解析核心在 `cm-subscribe`。
pub mod cli;
pub mod logging;
pub mod pipeline;
pub mod sources;
