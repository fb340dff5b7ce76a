// Domain layer - Core timeline model, editing rules and use cases

pub mod errors;
pub mod model;
pub mod rules;
pub mod usecases;
