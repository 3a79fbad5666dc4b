pub(crate) mod buffer;
pub(crate) mod io;
pub(crate) mod pixel;
pub(crate) mod resample;
pub(crate) mod view;
