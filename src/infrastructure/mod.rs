pub mod backends;
pub mod page;
