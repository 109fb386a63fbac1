/// Storage level errors. Discriminants are the binary protocol
/// status codes reported to the peer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CacheError {
    NotFound = 0x01,
    KeyExists = 0x02,
    ValueTooLarge = 0x03,
    ArithOnNonNumeric = 0x06,
    UnknownCommand = 0x81,
}

impl CacheError {
    pub fn to_static_string(&self) -> &'static str {
        static NOT_FOUND: &str = "Not found";
        static KEY_EXISTS: &str = "Key exists";

        match self {
            CacheError::NotFound => NOT_FOUND,
            CacheError::KeyExists => KEY_EXISTS,
            CacheError::ValueTooLarge => "Value too big",
            CacheError::ArithOnNonNumeric => "Incr/Decr on non numeric value",
            CacheError::UnknownCommand => "Invalid command",
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
