pub mod text;
pub mod wfdb;
