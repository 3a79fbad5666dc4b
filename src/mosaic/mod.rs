pub(crate) mod blend;
pub(crate) mod composite;
pub(crate) mod grassfire;
pub(crate) mod masks;
pub(crate) mod positioned;
pub(crate) mod pyramid;
