//! Credential handling for registration and login.

mod password;

pub use password::{
    MIN_PASSWORD_LENGTH, PasswordError, hash_password, validate_password, verify_password,
    verify_password_or_dummy,
};
