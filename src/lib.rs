use std::error::Error;

pub mod applier;
pub mod color;
pub mod config;
pub mod dom;
pub mod error;
pub mod listener;
pub mod model;
pub mod page;
pub mod path;
pub mod restore;
pub mod session;
pub mod storage;
pub mod store;

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
