#![allow(dead_code)]

pub mod fake_surface;
pub mod fixtures;
