pub mod accuracy;
pub mod context;
pub mod forecast;
pub mod records;
