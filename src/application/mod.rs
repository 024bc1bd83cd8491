pub mod auth;
pub mod bootstrap;
pub mod calendar;
pub mod clock_ticker;
pub mod commands;
pub mod quest_store;
pub mod session;
