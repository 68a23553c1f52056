pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod finalize;
pub mod fs_util;
pub mod layout;
pub mod nmredata;
pub mod normalize;
pub mod output;
pub mod report;
pub mod retrieve;
pub mod unpack;
