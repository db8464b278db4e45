pub mod records;
pub mod text;
