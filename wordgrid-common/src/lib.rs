pub mod config;

pub mod game_snapshot;

pub mod messages;

pub mod scoring;

pub mod timing;
