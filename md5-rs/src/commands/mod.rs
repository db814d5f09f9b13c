//! Command implementations for each file kind

pub mod anim;
pub mod mesh;
pub mod object;
