use crate::models::ResourceKind;
use uuid::Uuid;

pub const ID_LENGTH: usize = 15;

/// Opaque prefixed id, e.g. `svc_3f9a0c1b2d4e5f6`.
pub fn new_id(kind: ResourceKind) -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("{}_{}", kind.id_prefix(), &raw[..ID_LENGTH])
}

pub fn has_prefix(id: &str, kind: ResourceKind) -> bool {
    id.strip_prefix(kind.id_prefix())
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|rest| rest.len() == ID_LENGTH)
}
