pub(crate) mod generation;
