pub mod dispatch;
pub mod eval;
pub mod module;

pub use dispatch::dispatch;
