/// Middleware module
///
/// Request identity extraction and page guarding.

mod identity;

pub use identity::{AuthenticatedUser, ProtectedPages, LOGIN_PAGE, PROTECTED_PAGE_PREFIXES};
