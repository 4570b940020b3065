//! chatnav library exports for testing

pub mod core;
pub mod data;
pub mod lifecycle;
pub mod push;
pub mod shell;

#[cfg(test)]
pub mod test_support;
