pub mod init;
pub mod notes;
pub mod once;
pub mod run;
pub mod status;
pub mod summary;
pub mod todos;
