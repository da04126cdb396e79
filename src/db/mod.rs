pub mod changefeed;
pub mod db;
pub mod memorydb;
pub mod supportdb;
