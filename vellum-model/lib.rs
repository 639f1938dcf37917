use smartstring::{LazyCompact, SmartString};

pub mod annotation;
pub mod document;
pub mod element;
pub mod fragment;
pub mod history;
pub mod registry;
pub mod selection;
pub mod sequence;
pub mod transaction;
pub mod tree;

pub type Tendril = SmartString<LazyCompact>;
