pub mod value_validator;

pub use value_validator::Validator;
