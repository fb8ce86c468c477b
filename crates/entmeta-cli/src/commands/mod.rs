pub mod graph;
pub mod inspect;
pub mod validate;
