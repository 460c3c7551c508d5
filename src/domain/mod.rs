// Domain layer: core models, ports and the pure classification/aggregation services.

pub mod model;
pub mod ports;

pub mod services;
