//! Newsroom: the JSON backend of a news publishing site.

pub mod app_config;
pub mod articles;
pub mod cache;
pub mod constants;
pub mod db;
pub mod docstore;
pub mod error;
pub mod middleware;
pub mod orm;
pub mod role;
pub mod seed;
pub mod settings;
pub mod slug;
pub mod storage;
pub mod user;
pub mod web;
