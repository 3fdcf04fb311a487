pub mod patterns;
pub mod timestamps;
