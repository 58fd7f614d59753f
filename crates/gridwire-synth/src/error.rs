use thiserror::Error;

use gridwire_common::{BinOp, FuncName, Location, NumericFormat};
use gridwire_rtl::BuildError;

/// Everything that can abort a compilation. There is no runtime error
/// channel: once a circuit builds, ticks cannot fail.
#[derive(Debug, Error)]
pub enum SynthError {
    /// Grid construction with heterogeneous leaf formats.
    #[error("grid elements disagree on numeric format: expected {expected}, found {found}")]
    FormatMismatch {
        expected: NumericFormat,
        found: NumericFormat,
    },

    #[error("grid constructed with no elements")]
    EmptyGrid,

    /// Nested rows of different lengths, or scalars mixed with sub-grids
    /// at one level.
    #[error("grid rows are not uniform")]
    RaggedGrid,

    /// The formula surface parses more operators than the fixed-point
    /// layer implements (`/`, `^`, `&`).
    #[error("operator `{0}` has no hardware implementation")]
    UnsupportedOperator(BinOp),

    /// A recognized function name with no registered reduction engine.
    #[error("function {0} has no registered reduction")]
    UnknownFunction(FuncName),

    #[error("{0}: range value used where a scalar is required")]
    RangeAsScalar(Location),

    #[error("{0}: array literals may only contain numbers")]
    NonConstantArray(Location),

    /// A formula cell that (transitively) feeds itself. Reported with the
    /// cycle path, first location repeated at the end.
    #[error("circular reference: {}", format_cycle(.0))]
    CircularReference(Vec<Location>),

    #[error("{location}: {message}")]
    Parse { location: Location, message: String },

    #[error(transparent)]
    Build(#[from] BuildError),
}

fn format_cycle(locations: &[Location]) -> String {
    let parts: Vec<String> = locations.iter().map(ToString::to_string).collect();
    parts.join(" -> ")
}
