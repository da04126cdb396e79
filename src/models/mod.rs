pub mod realtimemodel;
pub mod supportmodel;
