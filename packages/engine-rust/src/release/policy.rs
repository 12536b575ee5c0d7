//! Release policies: when does a buffered group produce output?

use switchyard_core::MessageGroup;

/// Pure predicate evaluated after every add, under the group's lock.
pub trait ReleasePolicy: Send + Sync {
    fn is_releasable(&self, group: &MessageGroup) -> bool;
}

impl<F> ReleasePolicy for F
where
    F: Fn(&MessageGroup) -> bool + Send + Sync,
{
    fn is_releasable(&self, group: &MessageGroup) -> bool {
        self(group)
    }
}

/// Releasable once every declared member has arrived (`sequenceSize` from
/// the group's first sized member). Groups of unknown size never
/// auto-release; they wait for a forced or expiry-driven release.
pub struct SizeComplete;

impl ReleasePolicy for SizeComplete {
    fn is_releasable(&self, group: &MessageGroup) -> bool {
        group.is_complete()
    }
}

/// Releasable when the next expected sequence number is buffered, i.e. the
/// lowest unreleased position forms a contiguous run starting at 1.
///
/// With `release_partial` unset, additionally requires the group to be
/// size-complete, so nothing is emitted until the whole sequence is
/// present.
pub struct SequenceContiguous {
    pub release_partial: bool,
}

impl ReleasePolicy for SequenceContiguous {
    fn is_releasable(&self, group: &MessageGroup) -> bool {
        let next_buffered = group.contains_sequence(group.next_sequence());
        if self.release_partial {
            next_buffered
        } else {
            next_buffered && group.is_complete()
        }
    }
}

#[cfg(test)]
mod tests {
    use switchyard_core::Message;

    use super::*;

    fn group_with(numbers: &[u32], size: u32) -> MessageGroup {
        let mut group = MessageGroup::new("g".into());
        for n in numbers {
            group.add(
                Message::builder(format!("m{n}"))
                    .correlation_id("g")
                    .sequence_number(*n)
                    .sequence_size(size)
                    .build(),
            );
        }
        group
    }

    #[test]
    fn size_complete_waits_for_all_members() {
        let policy = SizeComplete;
        assert!(!policy.is_releasable(&group_with(&[1], 2)));
        assert!(policy.is_releasable(&group_with(&[1, 2], 2)));
    }

    #[test]
    fn size_complete_never_releases_unknown_size() {
        let mut group = MessageGroup::new("g".into());
        group.add(Message::builder(()).correlation_id("g").build());
        assert!(!SizeComplete.is_releasable(&group));
    }

    #[test]
    fn partial_contiguous_releases_on_prefix() {
        let policy = SequenceContiguous {
            release_partial: true,
        };
        assert!(!policy.is_releasable(&group_with(&[2], 4)));
        assert!(policy.is_releasable(&group_with(&[2, 1], 4)));
    }

    #[test]
    fn non_partial_contiguous_requires_completeness() {
        let policy = SequenceContiguous {
            release_partial: false,
        };
        assert!(!policy.is_releasable(&group_with(&[1, 2], 3)));
        assert!(policy.is_releasable(&group_with(&[3, 1, 2], 3)));
    }
}
