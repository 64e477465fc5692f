pub mod init;
pub mod list_models;
pub mod parse;
pub mod report;
pub mod run;
pub mod validate;
