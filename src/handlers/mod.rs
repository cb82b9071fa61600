pub(crate) mod billing;
pub(crate) mod payments;
