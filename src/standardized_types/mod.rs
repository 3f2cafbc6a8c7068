pub mod accounts;
pub mod enums;
pub mod new_types;
pub mod position;
