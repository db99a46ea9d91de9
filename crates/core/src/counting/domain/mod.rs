pub mod boundary;
pub mod count_result;
pub mod counting_session;
pub mod crossing_policy;
pub mod frame_sampler;
