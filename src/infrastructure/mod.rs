pub mod auth_client;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod logging;
pub mod quest_repository;
pub mod storage;
