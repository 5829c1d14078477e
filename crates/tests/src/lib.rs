//! Integration tests spanning the core and infra crates

#[cfg(test)]
mod chain_integration;
#[cfg(test)]
mod offline_render;
