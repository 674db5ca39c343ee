pub mod expression;
pub use expression::*;

pub mod binding;
pub use binding::{BindingCategory, Bindings};

pub mod predicate;
pub use predicate::*;

pub mod order;
pub use order::*;

pub mod args;
pub use args::*;

pub mod join_clause;
pub use join_clause::*;

pub mod row;
pub use row::*;

pub mod builder;
pub use builder::*;

pub mod wheres;

#[cfg(test)]
mod _tests;
