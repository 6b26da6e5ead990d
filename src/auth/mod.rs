/// Authentication module
///
/// Token issuance/verification, password hashing, auth cookies and
/// request identity resolution.

mod claims;
mod clock;
mod cookies;
mod jwt;
mod password;
mod resolve;

pub use claims::{Claims, Identity, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cookies::{CookiePolicy, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
pub use jwt::{TokenPair, TokenService};
pub use password::{derive_password_hash, needs_rehash, verify_password, verify_without_account};
pub use resolve::{bearer_token, cookie_token, resolve_identity};
