mod error_code;

pub use self::error_code::ErrorCode;
