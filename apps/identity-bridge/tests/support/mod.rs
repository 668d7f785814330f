#![allow(dead_code)]

pub mod app;
pub mod key_source;
