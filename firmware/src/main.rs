#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

mod link;

#[cfg(target_os = "none")]
mod hw;
#[cfg(target_os = "none")]
mod panic;
#[cfg(target_os = "none")]
mod runtime;

#[cfg(not(target_os = "none"))]
fn main() {}
