//! Run reports: per-test text files and the HTML summary

mod aggregator;
mod text;

pub use aggregator::{
    message_preview, ReportAggregator, Status, TestRecord, ELLIPSIS, MESSAGE_PREVIEW_CHARS,
};
pub use text::{save_report, EMPTY_BODY_NOTE};
