pub mod counting;
pub mod detection;
pub mod pipeline;
pub mod report;
pub mod shared;
pub mod tracking;
pub mod video;
