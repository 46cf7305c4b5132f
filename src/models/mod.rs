pub mod job;
pub mod run;
