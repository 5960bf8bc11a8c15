#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod api;
pub mod coordinate_store;
pub mod file_store;
pub mod gps_processor;
pub mod location_feed;
mod logs;
pub mod main_db;
pub mod route;
pub mod route_repository;
pub mod tracking_session;
pub mod user;
mod utils;
