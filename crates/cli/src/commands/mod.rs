pub mod compile;
pub mod config_cmd;
pub mod history;
pub mod models;
pub mod run;
