/// Client-side session handling
///
/// `SessionStore` holds the signed-in user and the in-memory access token.
/// `ApiClient` sends requests through the session guard, which on a 401
/// performs at most one refresh-and-replay before forcing a logout.

pub use error::ClientError;
pub use guard::{
    ApiClient, ApiRequest, GuardState, LogNavigator, LoginNavigator, LOGIN_ENDPOINT, LOGIN_PATH,
    LOGOUT_ENDPOINT, ME_ENDPOINT, REFRESH_ENDPOINT,
};
pub use session::{
    FileSessionStorage, MemorySessionStorage, Session, SessionStorage, SessionStore, SessionUser,
};

mod error;
mod guard;
mod session;
