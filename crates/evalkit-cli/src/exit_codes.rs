//! Exit codes for evalkit. These are part of the public contract.

pub const SUCCESS: i32 = 0;
pub const VALIDATION_FAILED: i32 = 1; // Some output was judged invalid (--strict only)
pub const INTERNAL_ERROR: i32 = 2; // Config, spawn or protocol error
