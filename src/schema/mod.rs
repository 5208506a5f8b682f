pub mod atom;
pub mod skeleton;
pub mod token;
