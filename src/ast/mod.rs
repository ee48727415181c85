pub mod meet;
pub mod query;
pub mod restriction;
pub mod values;

pub use self::meet::PropertyAccessor;
pub use self::query::{Direction, Disjunction, OrderBy, Query};
pub use self::restriction::{RangeBound, Restriction, RestrictionKind};
pub use self::values::Value;
