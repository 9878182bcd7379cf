pub mod event_record;
pub mod session;

pub use event_record::{floor_to_minute, BoundingBox, EventRecord};
pub use session::{Session, SessionStatus};
