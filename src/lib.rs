pub mod config;
pub mod skillpacks;
