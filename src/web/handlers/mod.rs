pub mod accounts;
pub mod analyze;
pub mod results;
