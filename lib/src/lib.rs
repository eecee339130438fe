#![no_std]

pub mod alignment;
pub mod klog;

pub use alignment::{align_down_usize, align_up_usize, next_pow2_u32, next_pow2_usize};
pub use klog::{KlogLevel, klog_get_level, klog_init, klog_register_backend, klog_set_level};
