mod common;

pub use common::*;

pub(crate) mod v2;

pub use v2::LineFlags;
