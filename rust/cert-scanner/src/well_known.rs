//! Path expressions for well-known document formats.

use crate::source::document::{Encoding, PathExpressionPair};

/// Locations of certificates in a kubeconfig.
///
/// Covers cluster CAs and user client certificates, each in both their inline (`*-data`) and
/// file-referencing forms. A kubeconfig normally only uses one form per entry, the other simply
/// matches nothing.
pub fn kubeconfig_expressions() -> Vec<PathExpressionPair> {
    vec![
        PathExpressionPair::new(
            "clusters.[*].cluster.certificate-authority-data",
            "clusters.[*].name",
            Encoding::InlineBase64,
        ),
        PathExpressionPair::new(
            "clusters.[*].cluster.certificate-authority",
            "clusters.[*].name",
            Encoding::FileReference,
        ),
        PathExpressionPair::new(
            "users.[*].user.client-certificate-data",
            "users.[*].name",
            Encoding::InlineBase64,
        ),
        PathExpressionPair::new(
            "users.[*].user.client-certificate",
            "users.[*].name",
            Encoding::FileReference,
        ),
    ]
}
