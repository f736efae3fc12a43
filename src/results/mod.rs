mod result_set;
mod row;
mod shape;

pub use result_set::{QueryResult, ResultSet};
pub use row::Row;
pub use shape::{coerce_value, shape_result_set};
