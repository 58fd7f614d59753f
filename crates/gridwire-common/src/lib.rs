pub mod format;
pub mod location;
pub mod ops;
pub mod range;

pub use format::NumericFormat;
pub use location::{Location, column_to_number, number_to_column};
pub use ops::{BinOp, FuncName};
pub use range::{Bounds, RangeRef};
