pub mod dispatch;
pub mod provision;
