pub mod identity_tracker;
pub mod track;
pub mod track_matcher;
