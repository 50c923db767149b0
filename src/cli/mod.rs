pub mod config;
pub mod relative_date;
pub mod render;
pub mod run;
