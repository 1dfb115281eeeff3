pub mod daily;

pub use daily::{seconds_until_hour, Clock, Sleeper, SystemClock, TokioSleeper};
