pub mod log_report_sink;
pub mod report_dispatcher;
pub mod telegram_report_sink;
