mod array;
mod function;
mod map;
mod sequence;

pub use array::ArrayItem;
pub use function::FunctionItem;
pub use map::MapItem;
pub use sequence::{Item, Sequence};
