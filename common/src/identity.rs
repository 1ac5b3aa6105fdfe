use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller identity confirmed by the identity provider.
///
/// The auth middleware inserts it into the request extensions, handlers read
/// it back through `web::ReqData<Identity>`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
}
