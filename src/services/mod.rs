pub mod custody;
pub mod lifecycle;
pub mod notify;
pub mod policy;
