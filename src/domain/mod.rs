// Domain layer: records, tables, schemas and the ports the core talks through.

pub mod model;
pub mod outcome;
pub mod ports;
pub mod schema;
pub mod table;
