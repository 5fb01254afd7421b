// Domain layer - Report model and the rules that shape it

pub mod model;
pub mod rules;
