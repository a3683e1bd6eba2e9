//! Which notification types each frequency announces.

use converge_core::NotificationFrequency;

use crate::types::{NotificationType, Severity};

/// Whether a subscription with `frequency` should receive `kind`.
///
/// - quiet: failures and operator actions (pin, unpin, pause, resume,
///   manual judgment)
/// - normal: quiet plus successes and delivery config changes
/// - verbose: everything
#[must_use]
pub fn announces(frequency: NotificationFrequency, kind: NotificationType) -> bool {
    match frequency {
        NotificationFrequency::Verbose => true,
        NotificationFrequency::Normal => {
            announced_when_quiet(kind)
                || kind.severity() == Severity::Success
                || kind == NotificationType::DeliveryConfigChanged
        }
        NotificationFrequency::Quiet => announced_when_quiet(kind),
    }
}

fn announced_when_quiet(kind: NotificationType) -> bool {
    kind.severity() == Severity::Failure
        || matches!(
            kind,
            NotificationType::ArtifactPinned
                | NotificationType::ArtifactUnpinned
                | NotificationType::ApplicationPaused
                | NotificationType::ApplicationResumed
                | NotificationType::ManualJudgmentAwait
                | NotificationType::ManualJudgmentUpdate
        )
}
