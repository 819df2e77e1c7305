#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod counts;
pub mod design;
pub mod family;
pub mod irls;
pub mod log_scalar;
pub mod method;
pub mod nested;
pub mod stats;
pub mod types;
pub mod wald;
