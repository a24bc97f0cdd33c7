pub(crate) mod classify;
pub(crate) mod format;
pub(crate) mod retrieve;
pub(crate) mod validate;
