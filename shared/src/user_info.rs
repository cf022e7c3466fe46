use serde::{Serialize, Deserialize};
use crate::models::Identity;

/// Header carrying the caller identity, set by the upstream auth provider.
pub const IDENTITY_HEADER: &str = "X-Identity";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub identity: Identity,
}

pub fn parse_identity(raw: &str) -> Option<Identity> {
    let token = raw.trim();
    (!token.is_empty()).then(|| Identity::new(token))
}

// Backend-specific Rocket implementation
#[cfg(feature = "backend")]
mod backend_impl {
    use super::*;
    use rocket::http::Status;
    use rocket::request::{FromRequest, Outcome};
    use rocket::Request;

    #[rocket::async_trait]
    impl<'r> FromRequest<'r> for UserInfo {
        type Error = ();

        async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
            match req.headers().get_one(IDENTITY_HEADER).and_then(parse_identity) {
                Some(identity) => Outcome::Success(UserInfo { identity }),
                None => Outcome::Error((Status::Unauthorized, ())),
            }
        }
    }
}
