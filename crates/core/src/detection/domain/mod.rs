pub mod detection;
pub mod pedestrian_detector;
