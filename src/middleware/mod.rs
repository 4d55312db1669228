/// Middleware module
///
/// `Protect` authenticates every request of a scope, `RestrictTo` narrows
/// it down to a set of roles.

mod protect;
mod restrict;

pub use protect::Protect;
pub use restrict::RestrictTo;
