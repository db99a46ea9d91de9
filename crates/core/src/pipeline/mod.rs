pub mod count_pedestrians_use_case;
pub mod counter_config;
pub mod pipeline_logger;
