pub mod formula;
pub mod setter;

pub use formula::compute;
pub use setter::ReserveSetter;
