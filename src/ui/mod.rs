pub mod buffer;
pub mod logs;
