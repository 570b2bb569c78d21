pub mod debug;
pub mod report;
