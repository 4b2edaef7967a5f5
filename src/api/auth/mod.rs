pub mod login;
pub mod register;
pub mod types;

pub use login::*;
pub use register::*;
