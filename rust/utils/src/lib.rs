pub mod bytes;
pub mod pem;
