//! File output for recorded simulation rows.

pub mod export;
