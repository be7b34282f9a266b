/* 📖 # What lives in randio_base?

randio_base holds the pieces every other randio crate depends on: the error
type, tracing setup and the process environment abstraction used for
working-directory lookups.
*/

pub mod env;
pub mod error;
pub mod tracing;

pub use env::{EnvHandle, MockEnvironment, ProcessEnvironment, RealEnvironment};
pub use error::{ErrorKind, IoResultExt, RandioError, RandioResult, ResultExt};
