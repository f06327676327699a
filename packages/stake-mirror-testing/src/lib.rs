#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

#[cfg(not(target_arch = "wasm32"))]
pub mod contracts;

#[cfg(not(target_arch = "wasm32"))]
pub mod provider;

#[cfg(not(target_arch = "wasm32"))]
pub mod suite;


#[cfg(not(target_arch = "wasm32"))]
pub use suite::*;
