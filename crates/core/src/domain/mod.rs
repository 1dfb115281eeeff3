pub mod battery;
pub mod weather;
