pub mod argb;
pub mod context;
