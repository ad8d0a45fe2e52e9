// src/lib.rs
pub mod chemistry {
    pub mod constants;
}

pub mod grouping;
