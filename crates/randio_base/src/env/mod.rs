/* 📖 # What is the process environment abstraction?

Resolving relative paths needs process-wide state: the working directory,
and on Windows the per-drive working directory, which can only be read by
temporarily switching the process into that drive. Every such access goes
through the `ProcessEnvironment` trait. `RealEnvironment` touches the real
process; `MockEnvironment` keeps the same state in memory for tests.

Calls through `RealEnvironment` mutate state shared by the whole process.
Callers that resolve drive-relative paths from several threads must
serialize around them.
*/

pub mod mock;
pub mod real_env;
mod traits;

pub use mock::MockEnvironment;
pub use real_env::RealEnvironment;
pub use traits::{EnvHandle, ProcessEnvironment};
