//! exit codes for fieldlogic commands
//!
//! these follow Unix conventions where 0 = success and non-zero = error
//! specific codes help scripts distinguish between failure types

/// command completed successfully
pub const SUCCESS: i32 = 0;

/// general or unknown error
pub const ERROR: i32 = 1;

/// a referenced field does not exist in the form
pub const FIELD_NOT_FOUND: i32 = 2;

/// form document could not be read or parsed
pub const FORM_ERROR: i32 = 3;

/// invalid command-line arguments
pub const INVALID_ARGS: i32 = 4;

/// conditional logic or configuration file error
pub const CONFIG_ERROR: i32 = 5;
