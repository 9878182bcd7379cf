mod registry;

pub use registry::TrackRegistry;
