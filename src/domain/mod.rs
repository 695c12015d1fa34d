// Domain layer: model types and the seams between the core and its collaborators.

pub mod model;
pub mod ports;
