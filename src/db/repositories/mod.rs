pub mod detections;
pub mod sessions;

pub(crate) use detections::insert_detection_rows;
