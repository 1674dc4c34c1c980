pub mod line;
pub mod listener;
pub mod stream;
