pub mod centroid_matcher;
pub mod external_id_matcher;
pub mod iou_matcher;
